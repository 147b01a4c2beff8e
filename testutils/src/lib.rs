//! Utilities used in tests in multiple crates within the workspace.

use std::{error::Error, marker::PhantomData};

use googletest::{
    description::Description,
    matcher::{Matcher, MatcherBase, MatcherResult},
};

/// Namespace that the markup producer declares as the document default.
pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";

/// Wraps `body` in a minimal TEI document with the default namespace declared.
pub fn tei_document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="{TEI_NS}" xmlns:xlink="http://www.w3.org/1999/xlink">
  <text>
    <body>
{body}
    </body>
  </text>
</TEI>
"#
    )
}

/// Creates a matcher against an `anyhow::Error` whose cause chain contains an error of the given
/// type, and whose first such error matches the inner matcher.
pub fn anyhow_downcasts_to<E, M>(inner: M) -> AnyhowDowncastTo<E, M> {
    AnyhowDowncastTo::<E, M> {
        inner,
        phantom_e: Default::default(),
    }
}

pub struct AnyhowDowncastTo<E, M> {
    inner: M,
    phantom_e: PhantomData<E>,
}

impl<E, M> AnyhowDowncastTo<E, M>
where
    E: Error + Send + Sync + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<E>()
    }

    fn find(actual: &anyhow::Error) -> Option<&E> {
        actual
            .downcast_ref::<E>()
            .or_else(|| actual.chain().find_map(|cause| cause.downcast_ref::<E>()))
    }
}

impl<E, M> MatcherBase for AnyhowDowncastTo<E, M> {}

impl<E, M> Matcher<&anyhow::Error> for AnyhowDowncastTo<E, M>
where
    E: Copy + Error + Send + Sync + 'static,
    M: Matcher<E>,
{
    fn matches(&self, actual: &anyhow::Error) -> MatcherResult {
        Self::find(actual)
            .map(|v| self.inner.matches(*v))
            .unwrap_or(MatcherResult::NoMatch)
    }

    fn explain_match(&self, actual: &anyhow::Error) -> Description {
        match Self::find(actual) {
            Some(e) => Description::new()
                .text(format!(
                    "which carries the expected error type {}",
                    Self::type_name()
                ))
                .text("with value")
                .nested(self.inner.explain_match(*e)),
            None => Description::new().text(format!(
                "which does not carry the expected error type {} (error was: {:#})",
                Self::type_name(),
                actual,
            )),
        }
    }

    fn describe(&self, matcher_result: MatcherResult) -> Description {
        match matcher_result {
            MatcherResult::Match => format!(
                "carries error type {} with value which {}",
                Self::type_name(),
                self.inner.describe(MatcherResult::Match)
            )
            .into(),
            MatcherResult::NoMatch => format!(
                "does not carry error type {} with value which {}",
                Self::type_name(),
                self.inner.describe(MatcherResult::Match)
            )
            .into(),
        }
    }
}
