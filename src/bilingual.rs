use crate::dom::{Document, NodeId};
use crate::profile::SiteProfile;
use crate::wrap::wrap_paragraphs;

pub const TABLE_CLASS: &str = "epub-bilingual-table";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    NotARow,
    ColumnCount(usize),
    EmptyColumn,
    Bilingual { left: NodeId, right: NodeId },
}

impl RowShape {
    pub fn is_bilingual(self) -> bool {
        matches!(self, RowShape::Bilingual { .. })
    }
}

/// Classifies a node against the bilingual-row predicate. Checks run in
/// order and the first failing one decides the shape.
pub fn row_shape(doc: &Document, node: NodeId, profile: &SiteProfile) -> RowShape {
    if !(doc.is_tag(node, "div") && doc.has_class(node, &profile.row_class)) {
        return RowShape::NotARow;
    }

    let columns = doc
        .children(node)
        .iter()
        .copied()
        .filter(|c| doc.is_tag(*c, "div") && doc.has_class(*c, &profile.column_class))
        .collect::<Vec<_>>();
    let &[left, right] = columns.as_slice() else {
        return RowShape::ColumnCount(columns.len());
    };

    let has_content = |column: NodeId| doc.has_text(column) || doc.contains_tag(column, "img");
    if !(has_content(left) && has_content(right)) {
        return RowShape::EmptyColumn;
    }

    RowShape::Bilingual { left, right }
}

/// Rebuilds the document root, replacing bilingual row runs with tables.
pub fn restructure(doc: &mut Document, profile: &SiteProfile) {
    let fragment = doc.root();
    let output = restructure_container(doc, fragment, profile);
    doc.set_root(output);
}

fn restructure_container(doc: &mut Document, source: NodeId, profile: &SiteProfile) -> NodeId {
    let attrs = doc
        .element(source)
        .map(|e| e.attrs.clone())
        .unwrap_or_default();
    let output = doc.create_element_with_attrs("div", attrs);
    let mut pending: Vec<NodeId> = Vec::new();

    for child in doc.children(source).to_vec() {
        if row_shape(doc, child, profile).is_bilingual() {
            pending.push(child);
            continue;
        }

        flush_group(doc, output, &mut pending, profile);
        if doc.is_tag(child, "div") {
            let nested = restructure_container(doc, child, profile);
            doc.append(output, nested);
        } else {
            doc.append(output, child);
        }
    }
    flush_group(doc, output, &mut pending, profile);

    output
}

fn flush_group(
    doc: &mut Document,
    output: NodeId,
    pending: &mut Vec<NodeId>,
    profile: &SiteProfile,
) {
    if pending.is_empty() {
        return;
    }

    let table = doc.create_element("table");
    doc.set_attr(table, "class", TABLE_CLASS);
    let mut rows = 0_usize;

    for row in pending.drain(..) {
        let RowShape::Bilingual { left, right } = row_shape(doc, row, profile) else {
            tracing::warn!(
                text = %truncate(&doc.text(row), 100),
                "dropping malformed bilingual row"
            );
            continue;
        };

        let tr = doc.create_element("tr");
        for column in [left, right] {
            let td = doc.create_element("td");
            if let Some(lang) = doc.attr(column, "lang").map(str::to_owned) {
                doc.set_attr(td, "lang", &lang);
            }
            wrap_paragraphs(doc, column, td);
            doc.append(tr, td);
        }
        doc.append(table, tr);
        rows += 1;
    }

    if rows == 0 {
        return;
    }
    tracing::debug!(rows, "built bilingual table");
    doc.append(output, table);
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
