//! Formatting utilities.

use std::fmt::{Debug, Display, Formatter, Result};

/// See [`fmt_with()`].
#[derive(Clone, Copy)]
pub(crate) struct FmtWith<F> {
    fmt: F,
}

/// Formats via a closure.
pub(crate) fn fmt_with<F: Fn(&mut Formatter) -> Result>(fmt: F) -> FmtWith<F> {
    FmtWith { fmt }
}

impl<F: Fn(&mut Formatter) -> Result> Debug for FmtWith<F> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        (self.fmt)(f)
    }
}

impl<F: Fn(&mut Formatter) -> Result> Display for FmtWith<F> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        (self.fmt)(f)
    }
}

/// Write `items` separated by `sep`, each formatted by `each`
pub(crate) fn write_separated<T, I, F>(f: &mut Formatter, items: I, sep: &str, each: F) -> Result
where
    I: IntoIterator<Item = T>,
    F: Fn(&mut Formatter, T) -> Result,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        each(f, item)?;
    }
    Ok(())
}
