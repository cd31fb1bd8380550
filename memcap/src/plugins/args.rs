/*!
Textual plugin arguments and their validation.

Arguments travel to a plugin as one string, e.g. `16m,seed=7,path="C:\a,b"`, and are parsed on
the plugin side. A leading bare value is stored under the `default` key.
*/

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use hashbrown::HashSet;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

const DEFAULT_KEY: &str = "default";
const QUOTES: &str = "\"'`";

/// Ordered key-value arguments.
///
/// ```
/// use memcap::plugins::Args;
///
/// let args: Args = "4m,seed=0x1234,path=\"/tmp/a,b\"".parse().unwrap();
/// assert_eq!(args.get_default(), Some("4m"));
/// assert_eq!(args.get("path"), Some("/tmp/a,b"));
///
/// let built = Args::with_default("4m").insert("seed", "0x1234");
/// assert_eq!(built.to_string(), "4m,seed=0x1234");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Args {
    entries: Vec<ArgEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ArgEntry {
    pub key: String,
    pub value: String,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(value: &str) -> Self {
        Self::new().insert(DEFAULT_KEY, value)
    }

    /// Adds `key`, or overwrites its value keeping the original position.
    pub fn insert(mut self, key: &str, value: &str) -> Self {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value.to_owned(),
            None => self.entries.push(ArgEntry {
                key: key.to_owned(),
                value: value.to_owned(),
            }),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn get_default(&self) -> Option<&str> {
        self.get(DEFAULT_KEY)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ArgEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn malformed(part: &str) -> Error {
    Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
        .log_error(format!("malformed argument `{}`", part))
}

impl FromStr for Args {
    type Err = Error;

    /// Parses `[default,]key=value[,key=value...]`.
    ///
    /// A bare value is only accepted in the first position. Empty keys are rejected, an empty
    /// string gives empty arguments.
    fn from_str(s: &str) -> Result<Self> {
        split_str_args(s, ',')
            .enumerate()
            .try_fold(Self::new(), |args, (pos, part)| {
                let mut kv = split_str_args(part, '=');
                match (kv.next(), kv.next(), kv.next()) {
                    (Some(key), Some(value), None) if !key.is_empty() => {
                        Ok(args.insert(key, value))
                    }
                    (Some(""), None, None) if pos == 0 => Ok(args),
                    (Some(value), None, None) if pos == 0 => Ok(args.insert(DEFAULT_KEY, value)),
                    _ => Err(malformed(part)),
                }
            })
    }
}

impl TryFrom<&str> for Args {
    type Error = Error;

    fn try_from(args: &str) -> Result<Self> {
        args.parse()
    }
}

fn quoted(value: &str) -> Cow<'_, str> {
    if value.contains([',', '=']) {
        Cow::Owned(format!("\"{}\"", value))
    } else {
        Cow::Borrowed(value)
    }
}

impl fmt::Display for Args {
    /// Writes the arguments back in parsable form, the default value first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = self.get_default().map(|v| quoted(v).into_owned());
        let named = self
            .iter()
            .filter(|e| e.key != DEFAULT_KEY)
            .map(|e| format!("{}={}", e.key, quoted(&e.value)));

        for (i, part) in default.into_iter().chain(named).enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&part)?;
        }
        Ok(())
    }
}

impl From<Args> for String {
    fn from(args: Args) -> Self {
        args.to_string()
    }
}

/// Checks [`Args`] against the set of arguments a plugin understands.
///
/// Its `Display` output doubles as the plugin help text.
///
/// ```
/// use memcap::plugins::{ArgDescriptor, Args, ArgsValidator};
///
/// let validator = ArgsValidator::new()
///     .arg(ArgDescriptor::new("default"))
///     .arg(ArgDescriptor::new("seed").description("layout seed"));
/// assert!(validator.validate(&"1m,seed=3".parse().unwrap()).is_ok());
/// assert!(validator.validate(&"procs=3".parse().unwrap()).is_err());
/// ```
#[derive(Debug, Default)]
pub struct ArgsValidator {
    args: Vec<ArgDescriptor>,
}

impl ArgsValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: ArgDescriptor) -> Self {
        self.args.push(arg);
        self
    }

    /// Rejects unknown keys, missing required keys and values refused by a validator fn.
    ///
    /// Unknown keys are reported first.
    pub fn validate(&self, args: &Args) -> Result<()> {
        let known: HashSet<&str> = self.args.iter().map(|d| d.name.as_str()).collect();
        if let Some(unknown) = args.iter().find(|e| !known.contains(e.key.as_str())) {
            return Err(Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgNotExists)
                .log_error(format!("unknown argument `{}`", unknown.key)));
        }

        self.args.iter().try_for_each(|desc| desc.check(args.get(&desc.name)))
    }
}

impl fmt::Display for ArgsValidator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, desc) in self.args.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", desc)?;
        }
        Ok(())
    }
}

pub type ArgValidator = Box<dyn Fn(&str) -> ::std::result::Result<(), &'static str> + Send + Sync>;

/// One argument a plugin accepts.
///
/// ```
/// use memcap::plugins::ArgDescriptor;
///
/// let procs = ArgDescriptor::new("procs")
///     .description("number of processes")
///     .validator(Box::new(|v| v.parse::<usize>().map(|_| ()).map_err(|_| "not a number")));
/// assert_eq!(procs.to_string(), "procs: number of processes");
/// ```
pub struct ArgDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub validator: Option<ArgValidator>,
}

impl ArgDescriptor {
    /// Optional argument without description or validator.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: None,
            required: false,
            validator: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn validator(mut self, validator: ArgValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn check(&self, value: Option<&str>) -> Result<()> {
        match (value, &self.validator) {
            (None, _) if self.required => {
                Err(
                    Error(ErrorOrigin::ArgsValidator, ErrorKind::RequiredArgNotFound)
                        .log_error(format!("missing required argument `{}`", self.name)),
                )
            }
            (Some(value), Some(validator)) => validator(value).map_err(|reason| {
                Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgValidation)
                    .log_error(format!("invalid value for `{}`: {}", self.name, reason))
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ArgDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let description = self.description.as_deref().unwrap_or("no description available");
        write!(f, "{}: {}", self.name, description)?;
        if self.required {
            f.write_str(" (required)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ArgDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Splits `inp` at `split_char`, except inside quotes.
///
/// `"`, `'` and `` ` `` quote, a backslash before a quote makes it literal. Quotes enclosing a
/// whole part are removed, an unterminated quote swallows the rest of the input.
///
/// ```
/// use memcap::plugins::args::split_str_args;
///
/// let parts: Vec<_> = split_str_args("a::'b:c'", ':').collect();
/// assert_eq!(parts, ["a", "", "b:c"]);
///
/// let parts: Vec<_> = split_str_args("a:\"b:c", ':').collect();
/// assert_eq!(parts, ["a", "\"b:c"]);
/// ```
pub fn split_str_args(inp: &str, split_char: char) -> impl Iterator<Item = &str> {
    let mut escaped = false;
    let mut open_quote = None;

    inp.split(move |c: char| {
        if QUOTES.contains(c) && !escaped {
            open_quote = match open_quote {
                None => Some(c),
                Some(q) if q == c => None,
                other => other,
            };
        }
        escaped = c == '\\';
        open_quote.is_none() && c == split_char
    })
    .map(unquote)
}

fn unquote(part: &str) -> &str {
    match part.chars().next() {
        Some(q) if QUOTES.contains(q) && part.len() >= 2 && part.ends_with(q) => {
            &part[q.len_utf8()..part.len() - q.len_utf8()]
        }
        _ => part,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits_only(value: &str) -> ::std::result::Result<(), &'static str> {
        if value.chars().all(|c| c.is_ascii_digit()) {
            Ok(())
        } else {
            Err("digits only")
        }
    }

    #[test]
    fn named_values() {
        let args: Args = "size=1m,seed=7,procs=3".parse().unwrap();
        assert_eq!(args.get("size"), Some("1m"));
        assert_eq!(args.get("seed"), Some("7"));
        assert_eq!(args.get("procs"), Some("3"));
        assert_eq!(args.get_default(), None);
        assert_eq!(args.get("missing"), None);
    }

    #[test]
    fn default_value_only_first() {
        let args: Args = "2m,seed=1".parse().unwrap();
        assert_eq!(args.get_default(), Some("2m"));

        assert_eq!(
            "seed=1,2m".parse::<Args>(),
            Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation))
        );
        assert!("=1".parse::<Args>().is_err());
        assert!("a=b=c".parse::<Args>().is_err());
        assert!("".parse::<Args>().unwrap().is_empty());
    }

    #[test]
    fn insert_keeps_position() {
        let args = Args::new()
            .insert("seed", "1")
            .insert("procs", "2")
            .insert("seed", "3");
        assert_eq!(args.get("seed"), Some("3"));
        assert_eq!(
            args.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            ["seed", "procs"]
        );
    }

    #[test]
    fn display_reparses() {
        let args = Args::new()
            .insert("b", "2")
            .insert("a", "x,y")
            .insert("default", "dflt");
        assert_eq!(args.to_string(), "dflt,b=2,a=\"x,y\"");

        let reparsed: Args = args.to_string().parse().unwrap();
        assert_eq!(reparsed.get("a"), Some("x,y"));
        assert_eq!(reparsed.get_default(), Some("dflt"));
        assert_eq!(reparsed.to_string(), args.to_string());
    }

    #[test]
    fn quoting() {
        let args: Args = "url=`tcp://host=a`,name='a,b',raw=\\\"x".parse().unwrap();
        assert_eq!(args.get("url"), Some("tcp://host=a"));
        assert_eq!(args.get("name"), Some("a,b"));
        assert_eq!(args.get("raw"), Some("\\\"x"));

        let args: Args = "remote=rpc://insecure:host.local".parse().unwrap();
        assert_eq!(args.get("remote"), Some("rpc://insecure:host.local"));
    }

    #[test]
    fn validation_errors() {
        let validator = ArgsValidator::new()
            .arg(ArgDescriptor::new("default"))
            .arg(ArgDescriptor::new("seed").required(true).validator(Box::new(digits_only)));

        assert_eq!(validator.validate(&"1m,seed=4".parse().unwrap()), Ok(()));
        assert_eq!(
            validator.validate(&"1m".parse().unwrap()),
            Err(Error(ErrorOrigin::ArgsValidator, ErrorKind::RequiredArgNotFound))
        );
        assert_eq!(
            validator.validate(&"seed=x4".parse().unwrap()),
            Err(Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgValidation))
        );
        assert_eq!(
            validator.validate(&"seed=x4,procs=1".parse().unwrap()),
            Err(Error(ErrorOrigin::ArgsValidator, ErrorKind::ArgNotExists))
        );
    }

    #[test]
    fn help_text() {
        let validator = ArgsValidator::new()
            .arg(ArgDescriptor::new("size").description("buffer size").required(true))
            .arg(ArgDescriptor::new("seed"));
        assert_eq!(
            validator.to_string(),
            "size: buffer size (required)\nseed: no description available"
        );
    }
}
