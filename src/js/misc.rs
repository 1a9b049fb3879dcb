use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use rquickjs::convert::Coerced;
use rquickjs::function::Opt;
use rquickjs::{Ctx, Exception, FromJs, Function, Result, Value};
use thiserror::Error;

use super::registry::HostModule;
use super::throw_named;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base64Error {
    #[error("the string to be encoded contains characters outside of the Latin1 range")]
    NotLatin1,
    #[error("the string to be decoded is not correctly encoded")]
    Malformed,
}

const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode a string of Latin-1 code points as base64.
pub fn btoa(input: &str) -> std::result::Result<String, Base64Error> {
    let bytes = input
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| Base64Error::NotLatin1))
        .collect::<std::result::Result<Vec<u8>, _>>()?;
    Ok(FORGIVING.encode(bytes))
}

/// Decode base64 into a string with one code point per byte. ASCII whitespace
/// is ignored and padding is optional.
pub fn atob(input: &str) -> std::result::Result<String, Base64Error> {
    let compact: String = input
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '\t' | '\n' | '\x0c' | '\r'))
        .collect();
    let bytes = FORGIVING
        .decode(compact.as_bytes())
        .map_err(|_| Base64Error::Malformed)?;
    Ok(bytes.into_iter().map(char::from).collect())
}

/// `atob`, `btoa` and `self`.
pub struct MiscModule;

impl HostModule for MiscModule {
    fn name(&self) -> &'static str {
        "misc"
    }

    fn exports<'js>(&self, ctx: &Ctx<'js>) -> Result<Vec<(&'static str, Value<'js>)>> {
        let atob_fn = Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, data: Opt<Value<'js>>| -> Result<String> {
                let data = string_argument(&ctx, "atob", data.0)?;
                atob(&data)
                    .map_err(|err| throw_named(&ctx, "InvalidCharacterError", &err.to_string()))
            },
        )?
        .with_name("atob")?;

        let btoa_fn = Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, data: Opt<Value<'js>>| -> Result<String> {
                let data = string_argument(&ctx, "btoa", data.0)?;
                btoa(&data)
                    .map_err(|err| throw_named(&ctx, "InvalidCharacterError", &err.to_string()))
            },
        )?
        .with_name("btoa")?;

        Ok(vec![
            ("atob", atob_fn.into_value()),
            ("btoa", btoa_fn.into_value()),
            ("self", ctx.globals().into_value()),
        ])
    }
}

fn string_argument<'js>(
    ctx: &Ctx<'js>,
    operation: &str,
    value: Option<Value<'js>>,
) -> Result<String> {
    match value {
        Some(value) => Ok(Coerced::<String>::from_js(ctx, value)?.0),
        None => Err(Exception::throw_type(
            ctx,
            &format!("Failed to execute '{operation}': 1 argument required, but only 0 present."),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_latin1() {
        assert_eq!(btoa("hello").unwrap(), "aGVsbG8=");
        assert_eq!(btoa("\u{ff}\u{0}").unwrap(), "/wA=");
        assert_eq!(btoa("").unwrap(), "");
    }

    #[test]
    fn rejects_wide_characters() {
        assert_eq!(btoa("snow \u{2603}"), Err(Base64Error::NotLatin1));
    }

    #[test]
    fn decodes_forgivingly() {
        assert_eq!(atob("aGVsbG8=").unwrap(), "hello");
        assert_eq!(atob("aGVsbG8").unwrap(), "hello");
        assert_eq!(atob(" aGVs\nbG8= ").unwrap(), "hello");
        assert_eq!(atob("/wA=").unwrap(), "\u{ff}\u{0}");
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(atob("a"), Err(Base64Error::Malformed));
        assert_eq!(atob("a*b="), Err(Base64Error::Malformed));
    }
}
