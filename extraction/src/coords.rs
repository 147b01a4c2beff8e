//! Decoding of the `"<page>,<x>,<y>,<w>,<h>"` region strings embedded in markup.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use crate::ExtractError;

/// A page region as authored in markup: a 1-based page number and a box in PDF points, with the
/// origin at the top-left of the page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateSpec {
    pub page: i64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Absolute rectangle in page points, `left`/`top` inclusive of the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PageRect {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

impl CoordinateSpec {
    /// The 0-based page index. Negative if the authored page number was not positive.
    pub fn page_index(&self) -> i64 {
        self.page - 1
    }

    pub fn rect(&self) -> PageRect {
        PageRect {
            left: self.x,
            top: self.y,
            right: self.x + self.w,
            bottom: self.y + self.h,
        }
    }

    /// Decodes `coords`, returning `None` if it is absent or blank.
    pub fn parse_optional(coords: Option<&str>) -> Result<Option<Self>> {
        match coords.map(str::trim) {
            None | Some("") => Ok(None),
            Some(coords) => coords.parse().map(Some),
        }
    }
}

impl FromStr for CoordinateSpec {
    type Err = anyhow::Error;

    /// Fails with [ExtractError::InvalidCoordinate] unless `s` holds exactly five fields: an
    /// integer page followed by four finite, non-negative numbers.
    fn from_str(s: &str) -> Result<Self> {
        parse_fields(s)
            .with_context(|| format!("decoding coordinates {:?}", s))
            .context(ExtractError::InvalidCoordinate)
    }
}

fn parse_fields(s: &str) -> Result<CoordinateSpec> {
    let fields: Vec<&str> = s.split(',').map(str::trim).collect();
    let [page, x, y, w, h] = fields.as_slice() else {
        return Err(anyhow!("expected 5 fields, got {}", fields.len()));
    };

    let page: i64 = page
        .parse()
        .with_context(|| format!("page number {:?}", page))?;

    Ok(CoordinateSpec {
        page,
        x: parse_measure("x", x)?,
        y: parse_measure("y", y)?,
        w: parse_measure("width", w)?,
        h: parse_measure("height", h)?,
    })
}

fn parse_measure(name: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("{} {:?} is not a number", name, value))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(anyhow!("{} {} is not finite and non-negative", name, parsed));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use googletest::prelude::*;
    use test_casing::{TestCases, cases, test_casing};
    use testutils::anyhow_downcasts_to;

    use super::*;

    #[gtest]
    fn test_parse_valid() -> Result<()> {
        let spec: CoordinateSpec = "4,308.58,208.67,248.12,127.18".parse()?;
        expect_eq!(
            spec,
            CoordinateSpec {
                page: 4,
                x: 308.58,
                y: 208.67,
                w: 248.12,
                h: 127.18,
            }
        );
        expect_eq!(spec.page_index(), 3);
        Ok(())
    }

    #[gtest]
    fn test_rect_is_absolute() -> Result<()> {
        let spec: CoordinateSpec = "2,100.0,200.0,50.0,30.0".parse()?;
        expect_eq!(
            spec.rect(),
            PageRect {
                left: 100.0,
                top: 200.0,
                right: 150.0,
                bottom: 230.0,
            }
        );
        expect_eq!(spec.rect().width(), 50.0);
        expect_eq!(spec.rect().height(), 30.0);
        Ok(())
    }

    #[gtest]
    fn test_parse_optional_absent() -> Result<()> {
        expect_eq!(CoordinateSpec::parse_optional(None)?, None);
        expect_eq!(CoordinateSpec::parse_optional(Some(""))?, None);
        expect_eq!(CoordinateSpec::parse_optional(Some("  "))?, None);
        expect_that!(CoordinateSpec::parse_optional(Some("1,0,0,1,1"))?, some(anything()));
        Ok(())
    }

    #[gtest]
    fn test_non_positive_page_is_decoded() -> Result<()> {
        // Range checking happens against the document; decoding keeps the value.
        let spec: CoordinateSpec = "0,1,1,1,1".parse()?;
        expect_eq!(spec.page_index(), -1);
        Ok(())
    }

    const INVALID: TestCases<&'static str> = cases! {
        [
            "1,2,3,4",
            "1,2,3,4,5,6",
            "one,2,3,4,5",
            "1.5,2,3,4,5",
            "1,2,x,4,5",
            "1,2,3,-4,5",
            "1,2,3,4,inf",
            "1,2,3,4,NaN",
            "1;2;3;4;5",
        ]
    };

    #[test_casing(9, INVALID)]
    #[gtest]
    fn test_parse_invalid(coords: &'static str) {
        expect_that!(
            coords.parse::<CoordinateSpec>(),
            err(anyhow_downcasts_to::<ExtractError, _>(eq(
                ExtractError::InvalidCoordinate
            ))),
        );
    }
}
