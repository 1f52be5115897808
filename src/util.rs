use super::error::Error;
use std::fmt::Debug;

/// Fails with an assertion error described by `desc` if `cond` does not hold.
pub fn assert_err(desc: impl AsRef<str>, cond: bool) -> Result<(), Error> {
    if cond {
        Ok(())
    } else {
        Err(Error::Assertion(desc.as_ref().to_owned()))
    }
}

/// Fails with an assertion error if `left != right`.
pub fn assert_eq<T: PartialEq + Debug>(
    desc: impl AsRef<str>,
    left: &T,
    right: &T,
) -> Result<(), Error> {
    if left == right {
        Ok(())
    } else {
        Err(Error::Assertion(format!(
            "expected left ({left:?}) to equal right ({right:?}): {}",
            desc.as_ref()
        )))
    }
}

/// Fails with an assertion error unless `result` is an error.
pub fn assert_is_err<T: Debug, E>(desc: impl AsRef<str>, result: &Result<T, E>) -> Result<(), Error> {
    match result {
        Err(_) => Ok(()),
        Ok(val) => Err(Error::Assertion(format!(
            "expected an error but got ({val:?}): {}",
            desc.as_ref()
        ))),
    }
}

/// The lowercase letter identifying the chain at `idx` (`a` for chain A).
pub fn chain_letter(idx: usize) -> char {
    (b'a' + (idx % 26) as u8) as char
}

/// The uppercase label of the chain at `idx` (`A` for chain A).
pub fn chain_label(idx: usize) -> char {
    chain_letter(idx).to_ascii_uppercase()
}
