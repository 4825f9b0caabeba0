//! Segment and field lookup over a raw HL7 payload.

/// Borrowed view of the segments of one message.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    segments: Vec<Vec<&'a str>>,
}

impl<'a> Segments<'a> {
    /// Split a payload into segments (`\r` or `\n`) and fields (`|`).
    pub fn parse(text: &'a str) -> Self {
        let segments = text
            .split(['\r', '\n'])
            .map(str::trim_start)
            .filter(|s| !s.is_empty())
            .map(|s| s.split('|').collect())
            .collect();
        Self { segments }
    }

    /// Field `index` of the first segment named `name`.
    ///
    /// Uses HL7 numbering: in MSH the field separator itself is MSH-1, so
    /// MSH-9 is the eighth `|`-delimited element after the segment name.
    pub fn field(&self, name: &str, index: usize) -> Option<&'a str> {
        let segment = self.segments.iter().find(|s| s.first() == Some(&name))?;
        let position = if name == "MSH" { index.checked_sub(1)? } else { index };
        if position == 0 {
            return None;
        }
        segment.get(position).copied()
    }

    /// Whether a segment named `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.segments.iter().any(|s| s.first() == Some(&name))
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the payload had no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
