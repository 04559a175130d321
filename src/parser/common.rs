//! Shared statement application helpers
//!
//! Both schema front-ends reduce their input to the same statement tree
//! and the same application rules: string-valued statements are
//! at-most-once, cardinality statements pack into the node flag word and
//! re-assertion of either is an error.

use crate::error::{ErrorKind, Result, SchemaError};
use crate::schema::node::flags;
use std::sync::Arc;

/// Apply an at-most-once string statement
pub(crate) fn check_string(
    target: &mut Option<Arc<str>>,
    what: &str,
    owner: &str,
    value: Arc<str>,
    line: u32,
) -> Result<()> {
    if target.is_some() {
        return Err(too_many(what, owner, line));
    }
    *target = Some(value);
    Ok(())
}

/// Set flag bits under a mask, rejecting re-assertion
pub(crate) fn check_flag(
    word: &mut u16,
    mask: u16,
    value: u16,
    what: &str,
    owner: &str,
    line: u32,
) -> Result<()> {
    if *word & mask != 0 {
        return Err(too_many(what, owner, line));
    }
    *word |= value;
    Ok(())
}

/// The `TOO_MANY` diagnostic
pub(crate) fn too_many(what: &str, owner: &str, line: u32) -> crate::error::Error {
    SchemaError::new(
        ErrorKind::TooMany,
        format!("statement \"{}\" repeated in \"{}\"", what, owner),
    )
    .with_line(line)
    .into()
}

/// The `MISSELEM` diagnostic for a required sub-statement
pub(crate) fn missing(what: &str, owner: &str, line: u32) -> crate::error::Error {
    SchemaError::new(
        ErrorKind::Misselem,
        format!("statement \"{}\" missing in \"{}\"", what, owner),
    )
    .with_line(line)
    .into()
}

/// The `INARG` diagnostic for a bad statement argument
pub(crate) fn bad_arg(value: &str, what: &str, line: u32) -> crate::error::Error {
    SchemaError::new(
        ErrorKind::Inarg,
        format!("invalid argument \"{}\" of \"{}\"", value, what),
    )
    .with_line(line)
    .into()
}

/// Map a `config` argument to its flag bit
pub(crate) fn config_flag(arg: &str, line: u32) -> Result<u16> {
    match arg {
        "true" => Ok(flags::CONFIG_W),
        "false" => Ok(flags::CONFIG_R),
        _ => Err(bad_arg(arg, "config", line)),
    }
}

/// Map a `mandatory` argument to its flag bit
pub(crate) fn mandatory_flag(arg: &str, line: u32) -> Result<u16> {
    match arg {
        "true" => Ok(flags::MAND_TRUE),
        "false" => Ok(flags::MAND_FALSE),
        _ => Err(bad_arg(arg, "mandatory", line)),
    }
}

/// Map a `status` argument to its flag bit
pub(crate) fn status_flag(arg: &str, line: u32) -> Result<u16> {
    match arg {
        "current" => Ok(flags::STATUS_CURR),
        "deprecated" => Ok(flags::STATUS_DEPRC),
        "obsolete" => Ok(flags::STATUS_OBSLT),
        _ => Err(bad_arg(arg, "status", line)),
    }
}

/// Parse a `min-elements`/`max-elements` argument
///
/// `max-elements "unbounded"` maps to zero.
pub(crate) fn elements_arg(arg: &str, what: &str, line: u32) -> Result<u32> {
    if what == "max-elements" && arg == "unbounded" {
        return Ok(0);
    }
    arg.parse::<u32>().map_err(|_| bad_arg(arg, what, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_string_once() {
        let mut slot = None;
        check_string(&mut slot, "presence", "container", Arc::from("up"), 1).unwrap();
        let err = check_string(&mut slot, "presence", "container", Arc::from("x"), 2).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TooMany));
        assert_eq!(slot.as_deref(), Some("up"));
    }

    #[test]
    fn test_check_flag_once() {
        let mut word = 0u16;
        check_flag(&mut word, flags::CONFIG_MASK, flags::CONFIG_W, "config", "leaf", 1).unwrap();
        let err = check_flag(&mut word, flags::CONFIG_MASK, flags::CONFIG_R, "config", "leaf", 2)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TooMany));
        assert_eq!(word, flags::CONFIG_W);
    }

    #[test]
    fn test_argument_parsers() {
        assert_eq!(config_flag("true", 1).unwrap(), flags::CONFIG_W);
        assert!(config_flag("yes", 1).is_err());
        assert_eq!(status_flag("obsolete", 1).unwrap(), flags::STATUS_OBSLT);
        assert_eq!(elements_arg("unbounded", "max-elements", 1).unwrap(), 0);
        assert_eq!(elements_arg("12", "min-elements", 1).unwrap(), 12);
        assert!(elements_arg("x", "min-elements", 1).is_err());
    }
}
