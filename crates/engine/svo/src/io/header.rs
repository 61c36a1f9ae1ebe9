//! Keyword/value text headers shared by the `.tri`, `.trip` and `.octree` files
//!
//! ```text
//! #<magic> <version>
//! <keyword> <value> [<value> ...]
//! ...
//! END
//! ```
//!
//! Unknown keywords are skipped, the caller decides which ones it knows.

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{line_ending, multispace0, space0, space1},
    combinator::eof,
    multi::many0,
    sequence::preceded,
    IResult,
};
use std::str::FromStr;

/// Terminating keyword of every header
pub const END: &str = "END";

/// One `keyword value...` line
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'a> {
    pub key: &'a str,
    pub values: Vec<&'a str>,
}

impl<'a> Field<'a> {
    /// Parse value `index` of this field
    pub fn value<T: FromStr>(&self, index: usize) -> Result<T, String> {
        let raw = self
            .values
            .get(index)
            .ok_or_else(|| format!("keyword [{}] is missing value {}", self.key, index + 1))?;
        raw.parse()
            .map_err(|_| format!("keyword [{}] has invalid value [{}]", self.key, raw))
    }
}

/// Parsed header: version from the magic line plus every field before `END`
#[derive(Debug, Clone, PartialEq)]
pub struct RawHeader<'a> {
    pub version: u32,
    pub fields: Vec<Field<'a>>,
}

fn token(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace())(input)
}

fn line(input: &str) -> IResult<&str, Field<'_>> {
    let (input, _) = multispace0(input)?;
    let (input, key) = token(input)?;
    let (input, values) = many0(preceded(space1, token))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = alt((line_ending, eof))(input)?;
    Ok((input, Field { key, values }))
}

/// Parse a header whose first token must be `magic`
pub fn parse_header<'a>(input: &'a str, magic: &str) -> Result<RawHeader<'a>, String> {
    let (mut rest, first) = line(input).map_err(|_| "empty header".to_string())?;
    if first.key != magic {
        return Err(format!(
            "first line reads [{}] instead of [{}]",
            first.key, magic
        ));
    }
    let version = first.value::<u32>(0)?;

    let mut fields = Vec::new();
    loop {
        if rest.trim().is_empty() {
            return Err(format!("header ends without [{END}]"));
        }
        let (next, field) =
            line(rest).map_err(|e| format!("malformed header line: {e}"))?;
        rest = next;
        if field.key == END {
            break;
        }
        fields.push(field);
    }

    Ok(RawHeader { version, fields })
}
