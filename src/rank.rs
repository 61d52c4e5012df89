use std::fmt;
use std::str::FromStr;

/// Base rank codes used in Kraken2-style reports.
///
/// `R` (root) and `K` (kingdom) are part of the report format even though
/// they rarely carry direct read assignments; anything outside this set is
/// treated as a malformed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankCode {
    Root,
    Domain,
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Unclassified,
}

impl RankCode {
    pub fn from_char(c: char) -> Option<RankCode> {
        match c {
            'R' => Some(RankCode::Root),
            'D' => Some(RankCode::Domain),
            'K' => Some(RankCode::Kingdom),
            'P' => Some(RankCode::Phylum),
            'C' => Some(RankCode::Class),
            'O' => Some(RankCode::Order),
            'F' => Some(RankCode::Family),
            'G' => Some(RankCode::Genus),
            'S' => Some(RankCode::Species),
            'U' => Some(RankCode::Unclassified),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            RankCode::Root => 'R',
            RankCode::Domain => 'D',
            RankCode::Kingdom => 'K',
            RankCode::Phylum => 'P',
            RankCode::Class => 'C',
            RankCode::Order => 'O',
            RankCode::Family => 'F',
            RankCode::Genus => 'G',
            RankCode::Species => 'S',
            RankCode::Unclassified => 'U',
        }
    }

    /// Position in the taxonomy, root coarsest. `None` for unclassified,
    /// which is not comparable to the real ranks.
    pub fn depth_order(&self) -> Option<u8> {
        match self {
            RankCode::Root => Some(0),
            RankCode::Domain => Some(1),
            RankCode::Kingdom => Some(2),
            RankCode::Phylum => Some(3),
            RankCode::Class => Some(4),
            RankCode::Order => Some(5),
            RankCode::Family => Some(6),
            RankCode::Genus => Some(7),
            RankCode::Species => Some(8),
            RankCode::Unclassified => None,
        }
    }
}

/// A full rank code as it appears in a report: a base code plus an optional
/// numeric sub-rank suffix (`G1`, `S2`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rank {
    pub code: RankCode,
    pub sub: u8,
}

impl Rank {
    pub fn new(code: RankCode) -> Self {
        Rank { code, sub: 0 }
    }

    /// Whether a taxon at this rank qualifies as a rollup target.
    ///
    /// Sub-ranks fold into their base rank unless `exact` is set, in which
    /// case only the unsuffixed code matches.
    pub fn matches(&self, target: RankCode, exact: bool) -> bool {
        self.code == target && (!exact || self.sub == 0)
    }

    /// True when this rank sits strictly below `target` in the taxonomy.
    /// Incomparable ranks (unclassified) are never finer.
    pub fn finer_than(&self, target: RankCode) -> bool {
        match (self.code.depth_order(), target.depth_order()) {
            (Some(a), Some(b)) => a > b || (a == b && self.sub > 0),
            _ => false,
        }
    }

    /// True when this rank sits strictly above `target`.
    pub fn coarser_than(&self, target: RankCode) -> bool {
        match (self.code.depth_order(), target.depth_order()) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let code = chars
            .next()
            .and_then(RankCode::from_char)
            .ok_or_else(|| format!("unrecognized rank code '{}'", s))?;
        let rest = chars.as_str();
        let sub = if rest.is_empty() {
            0
        } else {
            rest.parse::<u8>()
                .map_err(|_| format!("unrecognized rank code '{}'", s))?
        };
        Ok(Rank { code, sub })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub == 0 {
            write!(f, "{}", self.code.as_char())
        } else {
            write!(f, "{}{}", self.code.as_char(), self.sub)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_base_and_sub_ranks() {
        assert_eq!("G".parse::<Rank>().unwrap(), Rank::new(RankCode::Genus));
        assert_eq!(
            "G1".parse::<Rank>().unwrap(),
            Rank {
                code: RankCode::Genus,
                sub: 1
            }
        );
        assert_eq!("U".parse::<Rank>().unwrap().code, RankCode::Unclassified);
        assert!("X".parse::<Rank>().is_err());
        assert!("Gx".parse::<Rank>().is_err());
        assert!("".parse::<Rank>().is_err());
    }

    #[test]
    fn sub_rank_matches_base_unless_exact() {
        let g1: Rank = "G1".parse().unwrap();
        assert!(g1.matches(RankCode::Genus, false));
        assert!(!g1.matches(RankCode::Genus, true));
        assert!(Rank::new(RankCode::Genus).matches(RankCode::Genus, true));
    }

    #[test]
    fn rank_ordering() {
        let species = Rank::new(RankCode::Species);
        let family = Rank::new(RankCode::Family);
        assert!(species.finer_than(RankCode::Genus));
        assert!(family.coarser_than(RankCode::Genus));
        assert!(!family.finer_than(RankCode::Genus));
        let g1: Rank = "G1".parse().unwrap();
        assert!(g1.finer_than(RankCode::Genus));
        let unclassified = Rank::new(RankCode::Unclassified);
        assert!(!unclassified.finer_than(RankCode::Genus));
        assert!(!unclassified.coarser_than(RankCode::Genus));
    }

    #[test]
    fn display_round_trip() {
        for s in ["R", "D", "K", "P", "C", "O", "F", "G", "S", "U", "G2"] {
            assert_eq!(s.parse::<Rank>().unwrap().to_string(), s);
        }
    }
}
