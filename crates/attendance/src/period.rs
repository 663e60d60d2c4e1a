use roster_core::{DomainError, DomainResult};

/// Most records returned by the "recent" attendance view.
pub const RECENT_WINDOW: usize = 12;

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=9999).contains(&year) {
            return Err(DomainError::validation(format!(
                "year {year} is out of range 1..=9999"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!(
                "month {month} is out of range 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl core::fmt::Display for Period {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_are_enforced() {
        assert!(Period::new(2025, 0).is_err());
        assert!(Period::new(2025, 13).is_err());
        assert!(Period::new(0, 5).is_err());
        assert_eq!(Period::new(2025, 12).unwrap().to_string(), "2025-12");
    }

    #[test]
    fn periods_order_chronologically() {
        let dec = Period::new(2024, 12).unwrap();
        let jan = Period::new(2025, 1).unwrap();
        let mar = Period::new(2025, 3).unwrap();
        assert!(dec < jan && jan < mar);
        assert_eq!(dec.max(mar), mar);
    }
}
