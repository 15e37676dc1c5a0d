use crate::dom::{Document, NodeId, NodeKind};

const BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "blockquote",
    "pre",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRole {
    Dropped,
    Container,
    Block,
    Standalone,
    Inline,
}

pub fn child_role(doc: &Document, child: NodeId) -> ChildRole {
    let element = match doc.kind(child) {
        NodeKind::Comment(_) => return ChildRole::Dropped,
        NodeKind::Text(text) if text.trim().is_empty() => return ChildRole::Dropped,
        NodeKind::Text(_) => return ChildRole::Inline,
        NodeKind::Element(element) => element,
    };

    let name = element.name.as_str();
    if name == "div" {
        ChildRole::Container
    } else if BLOCK_TAGS.contains(&name) {
        ChildRole::Block
    } else if name == "img"
        || (name == "a" && element.attr("href").is_some() && doc.contains_tag(child, "img"))
    {
        ChildRole::Standalone
    } else {
        ChildRole::Inline
    }
}

/// Moves the children of `source` into `target`, wrapping loose inline runs
/// in `<p>` elements.
pub fn wrap_paragraphs(doc: &mut Document, source: NodeId, target: NodeId) {
    let mut open: Option<NodeId> = None;

    for child in doc.children(source).to_vec() {
        match child_role(doc, child) {
            ChildRole::Dropped => {}
            ChildRole::Container => {
                close_paragraph(doc, target, &mut open);
                let attrs = doc
                    .element(child)
                    .map(|e| e.attrs.clone())
                    .unwrap_or_default();
                let container = doc.create_element_with_attrs("div", attrs);
                wrap_paragraphs(doc, child, container);
                doc.append(target, container);
            }
            ChildRole::Block | ChildRole::Standalone => {
                close_paragraph(doc, target, &mut open);
                doc.append(target, child);
            }
            ChildRole::Inline => {
                let paragraph = *open.get_or_insert_with(|| doc.create_element("p"));
                doc.append(paragraph, child);
            }
        }
    }

    if let Some(paragraph) = open
        && doc.has_text(paragraph)
    {
        doc.append(target, paragraph);
    }
}

fn close_paragraph(doc: &mut Document, target: NodeId, open: &mut Option<NodeId>) {
    if let Some(paragraph) = open.take() {
        doc.append(target, paragraph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_first_div(html: &str) -> String {
        let mut doc = Document::parse(html);
        let source = doc
            .find_first_by_tag(doc.root(), "div")
            .expect("source div");
        let target = doc.create_element("td");
        wrap_paragraphs(&mut doc, source, target);
        doc.inner_xhtml(target)
    }

    #[test]
    fn already_wrapped_paragraph_is_left_alone() {
        let out = wrap_first_div("<html><body><div><p>text</p></div></body></html>");
        assert_eq!(out, "<p>text</p>");
    }

    #[test]
    fn loose_text_and_inline_elements_share_one_paragraph() {
        let out = wrap_first_div(
            "<html><body><div>Il était <em>une fois</em> <a href=\"/x\">ici</a></div></body></html>",
        );
        assert_eq!(out, "<p>Il était <em>une fois</em><a href=\"/x\">ici</a></p>");
    }

    #[test]
    fn block_children_split_paragraphs() {
        let out = wrap_first_div(
            "<html><body><div>before<h2>Title</h2>after<ul><li>x</li></ul></div></body></html>",
        );
        assert_eq!(
            out,
            "<p>before</p><h2>Title</h2><p>after</p><ul><li>x</li></ul>"
        );
    }

    #[test]
    fn images_stand_alone() {
        let out = wrap_first_div(
            "<html><body><div>caption <img src=\"a.png\"> more <a href=\"/big\"><img src=\"b.png\"></a></div></body></html>",
        );
        assert_eq!(
            out,
            "<p>caption </p><img src=\"a.png\" /><p> more </p><a href=\"/big\"><img src=\"b.png\" /></a>"
        );
    }

    #[test]
    fn nested_div_is_rewrapped_with_its_attributes() {
        let out = wrap_first_div(
            "<html><body><div><div class=\"verse\" lang=\"fr\">line <b>one</b></div></div></body></html>",
        );
        assert_eq!(
            out,
            "<div class=\"verse\" lang=\"fr\"><p>line <b>one</b></p></div>"
        );
    }

    #[test]
    fn whitespace_and_comments_are_dropped() {
        let out = wrap_first_div(
            "<html><body><div>\n  <!-- note -->\n  <p>kept</p>\n  </div></body></html>",
        );
        assert_eq!(out, "<p>kept</p>");
    }

    #[test]
    fn trailing_paragraph_without_text_is_not_emitted() {
        let out = wrap_first_div("<html><body><div><p>kept</p><span> </span></div></body></html>");
        assert_eq!(out, "<p>kept</p>");
    }
}
