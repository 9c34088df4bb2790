//! In-memory region parsing.
//!
//! Used to locate the regions the generator proposes in newly generated
//! text. Regions do not nest: a start marker seen while another region is
//! open is treated as plain text, and a region whose end marker never
//! appears is not a region at all.

use crate::Pragma;
use crate::marker::MarkerKind;

/// A region found in text, with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// The region name carried by both markers.
    pub name: String,
    /// The raw lines between the markers, line terminators included.
    pub body: String,
    /// 0-based index of the start marker line.
    pub start_index: usize,
    /// 0-based index of the end marker line.
    pub end_index: usize,
}

/// Parses all complete regions from `content`, in order of appearance.
///
/// # Example
/// ```
/// use mat_pragma::{Pragma, parse_regions};
///
/// let content = "head\n/* mat custom [start] */\nbody\n/* mat custom [end] */\ntail\n";
/// let regions = parse_regions(content, &Pragma::default());
/// assert_eq!(regions.len(), 1);
/// assert_eq!(regions[0].name, "custom");
/// assert_eq!(regions[0].body, "body\n");
/// ```
pub fn parse_regions(content: &str, pragma: &Pragma) -> Vec<Region> {
    let mut regions = Vec::new();
    // (name, start index, byte offset where the body begins)
    let mut open: Option<(&str, usize, usize)> = None;
    let mut offset = 0;

    for (index, line) in content.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();

        let Some(marker) = pragma.parse_line(line) else {
            continue;
        };

        match (open, marker.kind) {
            (None, MarkerKind::Start) => open = Some((marker.name, index, offset)),
            (Some((name, start_index, body_start)), MarkerKind::End) if name == marker.name => {
                regions.push(Region {
                    name: name.to_string(),
                    body: content[body_start..line_start].to_string(),
                    start_index,
                    end_index: index,
                });
                open = None;
            }
            _ => {}
        }
    }

    regions
}

/// Finds the first region named `name`.
pub fn find_region(content: &str, name: &str, pragma: &Pragma) -> Option<Region> {
    parse_regions(content, pragma)
        .into_iter()
        .find(|region| region.name == name)
}
