//! Parsing of single filter queries.
//!
//! A query reads `[!] <field> [<value_idx>] [<op> <threshold>]`, where the
//! field is an INFO name, a position column, a FILTER value, a breakend
//! locus (`be1 chr1:100-200`) or a sample FORMAT (`tumor PR 1 > 5`).

use regex::Regex;

use crate::err::Error;

/// Relational operator of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Operator {
    #[strum(serialize = "==", serialize = "=")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl Operator {
    /// Apply to an ordering of `value` relative to the threshold.
    pub fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Operator::Eq => ordering == Equal,
            Operator::Ne => ordering != Equal,
            Operator::Lt => ordering == Less,
            Operator::Le => ordering != Greater,
            Operator::Gt => ordering == Greater,
            Operator::Ge => ordering != Less,
        }
    }
}

/// Right-hand side of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: Operator,
    /// Untyped threshold literal, typed against the metadata on evaluation.
    pub threshold: String,
}

/// Which end of an SV a locus query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// A `chrom[:start[-end]]` region, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl Region {
    pub fn contains(&self, chrom: &str, pos: i64) -> bool {
        chrom == self.chrom
            && self.start.map(|start| pos >= start).unwrap_or(true)
            && self.end.map(|end| pos <= end).unwrap_or(true)
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = |s: &str| -> Result<i64, String> {
            s.replace(',', "")
                .parse()
                .map_err(|e| format!("invalid coordinate {:?}: {}", s, e))
        };
        // the range is the part after the last colon if it starts with a digit
        let re = Regex::new(r"^(?P<chrom>[^:].*?)(?::(?P<range>\d[^:]*))?$")
            .map_err(|e| e.to_string())?;
        let caps = re
            .captures(s)
            .ok_or_else(|| String::from("empty chromosome"))?;
        let chrom = caps.name("chrom").map(|m| m.as_str()).unwrap_or_default();
        let (start, end) = match caps.name("range").map(|m| m.as_str()) {
            None => (None, None),
            Some(range) => match range.split_once('-') {
                None => (Some(number(range)?), None),
                Some((start, end)) => (Some(number(start)?), Some(number(end)?)),
            },
        };
        Ok(Region {
            chrom: chrom.to_string(),
            start,
            end,
        })
    }
}

/// What a query selects on.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// An INFO table, a position column or a FILTER value.
    Field { name: String, value_idx: usize },
    /// Breakend locus.
    Locus { side: Side, region: Region },
    /// FORMAT values of one sample.
    Format {
        sample: String,
        format: String,
        value_idx: usize,
    },
}

/// One parsed query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub raw: String,
    pub negated: bool,
    pub target: Target,
    pub comparison: Option<Comparison>,
}

/// Split `body` at the first relational operator.
fn split_comparison(body: &str) -> Option<(&str, &str, &str)> {
    let bytes = body.as_bytes();
    let idx = (1..bytes.len()).find(|&idx| match bytes[idx] {
        b'=' | b'<' | b'>' => true,
        b'!' => bytes.get(idx + 1) == Some(&b'='),
        _ => false,
    })?;
    let op_len = if bytes.get(idx + 1) == Some(&b'=') { 2 } else { 1 };
    Some((
        body[..idx].trim_end(),
        &body[idx..idx + op_len],
        body[idx + op_len..].trim(),
    ))
}

impl Query {
    /// Parse `raw`, the sample names distinguish FORMAT queries.
    pub fn parse(raw: &str, samples: &[String]) -> Result<Self, Error> {
        let invalid = |msg: &str| Error::query(raw, msg);

        let trimmed = raw.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(body) if !body.starts_with('=') => (true, body.trim_start()),
            _ => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid("empty query"));
        }

        let (lhs, comparison) = match split_comparison(body) {
            Some((lhs, op, threshold)) => {
                let op = op
                    .parse::<Operator>()
                    .map_err(|_| invalid("unknown operator"))?;
                if threshold.is_empty() || threshold.contains(char::is_whitespace) {
                    return Err(invalid("threshold must be a single literal"));
                }
                (
                    lhs,
                    Some(Comparison {
                        op,
                        threshold: threshold.to_string(),
                    }),
                )
            }
            None => (body, None),
        };

        let tokens = lhs.split_whitespace().collect::<Vec<_>>();
        let value_idx = |token: Option<&&str>| -> Result<usize, Error> {
            token
                .map(|token| {
                    token
                        .parse()
                        .map_err(|_| invalid(&format!("invalid value index {:?}", token)))
                })
                .transpose()
                .map(|idx| idx.unwrap_or(0))
        };

        let target = match tokens.as_slice() {
            [] => return Err(invalid("missing field")),
            [field, locus] if comparison.is_none() && side_of(field).is_some() => Target::Locus {
                side: side_of(field).unwrap_or(Side::First),
                region: locus
                    .parse::<Region>()
                    .map_err(|msg| invalid(&msg))?,
            },
            [sample, format, rest @ ..] if samples.iter().any(|s| s == sample) => {
                if rest.len() > 1 {
                    return Err(invalid("too many tokens"));
                }
                Target::Format {
                    sample: sample.to_string(),
                    format: format.to_string(),
                    value_idx: value_idx(rest.first())?,
                }
            }
            [field, rest @ ..] => {
                if rest.len() > 1 {
                    return Err(invalid("too many tokens"));
                }
                Target::Field {
                    name: field.to_string(),
                    value_idx: value_idx(rest.first())?,
                }
            }
        };

        Ok(Query {
            raw: raw.to_string(),
            negated,
            target,
            comparison,
        })
    }
}

fn side_of(field: &str) -> Option<Side> {
    match field.to_ascii_lowercase().as_str() {
        "be1" | "pos1" => Some(Side::First),
        "be2" | "pos2" => Some(Side::Second),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn samples() -> Vec<String> {
        vec!["normal".to_string(), "tumor".to_string()]
    }

    fn field(name: &str, value_idx: usize) -> Target {
        Target::Field {
            name: name.to_string(),
            value_idx,
        }
    }

    fn cmp(op: Operator, threshold: &str) -> Option<Comparison> {
        Some(Comparison {
            op,
            threshold: threshold.to_string(),
        })
    }

    #[rstest::rstest]
    #[case("svtype == DEL", false, field("svtype", 0), cmp(Operator::Eq, "DEL"))]
    #[case("svlen > -100", false, field("svlen", 0), cmp(Operator::Gt, "-100"))]
    #[case("svlen>=-100", false, field("svlen", 0), cmp(Operator::Ge, "-100"))]
    #[case("cipos 1 <= 10", false, field("cipos", 1), cmp(Operator::Le, "10"))]
    #[case("!IMPRECISE", true, field("IMPRECISE", 0), None)]
    #[case("PASS", false, field("PASS", 0), None)]
    #[case("qual != 20.5", false, field("qual", 0), cmp(Operator::Ne, "20.5"))]
    #[case(
        "tumor PR 1 > 5",
        false,
        Target::Format { sample: "tumor".into(), format: "PR".into(), value_idx: 1 },
        cmp(Operator::Gt, "5")
    )]
    #[case(
        "!normal SR",
        true,
        Target::Format { sample: "normal".into(), format: "SR".into(), value_idx: 0 },
        None
    )]
    #[case(
        "be2 chr2:1,000-2,000",
        false,
        Target::Locus {
            side: Side::Second,
            region: Region { chrom: "chr2".into(), start: Some(1000), end: Some(2000) },
        },
        None
    )]
    #[case(
        "pos1 chr1:100",
        false,
        Target::Locus {
            side: Side::First,
            region: Region { chrom: "chr1".into(), start: Some(100), end: None },
        },
        None
    )]
    fn parse(
        #[case] raw: &str,
        #[case] negated: bool,
        #[case] target: Target,
        #[case] comparison: Option<Comparison>,
    ) -> Result<(), anyhow::Error> {
        let query = Query::parse(raw, &samples())?;

        assert_eq!(query.negated, negated);
        assert_eq!(query.target, target);
        assert_eq!(query.comparison, comparison);

        Ok(())
    }

    #[rstest::rstest]
    #[case("")]
    #[case("!")]
    #[case("svlen x y > 1")]
    #[case("cipos one > 1")]
    #[case("svlen >")]
    #[case("svlen > 1 2")]
    #[case("be1 :100")]
    fn parse_fails(#[case] raw: &str) {
        assert!(matches!(
            Query::parse(raw, &samples()),
            Err(Error::InvalidQuery { .. })
        ));
    }

    #[rstest::rstest]
    #[case("chr1", None, None)]
    #[case("chr1:100", Some(100), None)]
    #[case("chr1:100-200", Some(100), Some(200))]
    #[case("chr1:1,000-2,000", Some(1000), Some(2000))]
    fn region(
        #[case] raw: &str,
        #[case] start: Option<i64>,
        #[case] end: Option<i64>,
    ) -> Result<(), String> {
        let region: Region = raw.parse()?;
        assert_eq!(region.chrom, "chr1");
        assert_eq!((region.start, region.end), (start, end));

        Ok(())
    }

    #[rstest::rstest]
    #[case("")]
    #[case(":100")]
    #[case("chr1:100-x")]
    fn region_fails(#[case] raw: &str) {
        assert!(raw.parse::<Region>().is_err());
    }

    #[rstest::rstest]
    #[case("chr1", 100, true)]
    #[case("chr1", 99, false)]
    #[case("chr1", 200, true)]
    #[case("chr1", 201, false)]
    #[case("chr2", 150, false)]
    fn region_contains(#[case] chrom: &str, #[case] pos: i64, #[case] expected: bool) {
        let region = Region {
            chrom: "chr1".into(),
            start: Some(100),
            end: Some(200),
        };
        assert_eq!(expected, region.contains(chrom, pos));
    }
}
