use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Inclusive 1-based page span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: NonZeroU32,
    pub end: NonZeroU32,
}

impl PageRange {
    pub fn contains(&self, page: u32) -> bool {
        (self.start.get()..=self.end.get()).contains(&page)
    }

    pub fn page_count(&self) -> u32 {
        self.end.get() - self.start.get() + 1
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Comma separated list of pages and spans, e.g. `1-3, 5, 8-9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    ranges: Vec<PageRange>,
}

impl PageSelection {
    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    /// Highest page referenced; a document must have at least this many.
    pub fn last_page(&self) -> u32 {
        self.ranges.iter().map(|r| r.end.get()).max().unwrap_or(0)
    }

    pub fn contains(&self, page: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(page))
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let ranges = input
            .split(',')
            .map(str::trim)
            .map(parse_range)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ranges })
    }
}

fn parse_range(segment: &str) -> Result<PageRange, String> {
    if segment.is_empty() {
        return Err("empty page segment".to_string());
    }
    let (start, end) = match segment.split_once('-') {
        Some((start, end)) => (parse_page(start)?, parse_page(end)?),
        None => {
            let page = parse_page(segment)?;
            (page, page)
        }
    };
    if start > end {
        return Err(format!("range {start}-{end} runs backwards"));
    }
    Ok(PageRange { start, end })
}

fn parse_page(raw: &str) -> Result<NonZeroU32, String> {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| format!("\"{raw}\" is not a page number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_mixed_list() {
        let sel: PageSelection = "1-3, 5,8 - 9".parse().unwrap();
        let rendered: Vec<String> = sel.ranges().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["1-3", "5", "8-9"]);
        assert_eq!(sel.last_page(), 9);
        assert!(sel.contains(2));
        assert!(!sel.contains(4));
        assert_eq!(sel.ranges()[0].page_count(), 3);
    }

    #[test]
    fn test_rejects_bad_input() {
        for bad in ["", "0", "3-1", "1,,2", "a-b", "-4", "2-", "1.5"] {
            assert!(bad.parse::<PageSelection>().is_err(), "accepted {bad:?}");
        }
    }
}
