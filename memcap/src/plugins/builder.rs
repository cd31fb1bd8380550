/*!
Chained construction of connectors and os plugins.

A chain alternates between connectors and os layers. Every instance becomes the input of the
step after it, the builder type tracks which kind the chain currently ends with:

```ignore
let os = inventory
    .builder()
    .connector("dummy")
    .args(str::parse("size=4m")?)
    .os("dummy")
    .build()?;
```
*/

use super::{Args, ConnectorInstance, Inventory, OsInstance};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

/// A single plugin in a chain, with its optional arguments.
pub enum BuildStep<'a> {
    Connector { name: &'a str, args: Option<Args> },
    Os { name: &'a str, args: Option<Args> },
}

impl<'a> BuildStep<'a> {
    /// Parses a `name[:args]` connector step, e.g. `dummy:size=16m`.
    pub fn new_connector(input: &'a str) -> Result<Self> {
        let (name, args) = split_step(input)?;
        Ok(Self::Connector { name, args })
    }

    /// Parses a `name[:args]` os step, e.g. `dummy:seed=7,procs=5`.
    pub fn new_os(input: &'a str) -> Result<Self> {
        let (name, args) = split_step(input)?;
        Ok(Self::Os { name, args })
    }

    fn is_connector(&self) -> bool {
        matches!(self, Self::Connector { .. })
    }

    /// Whether `next` may follow this step. Two steps of the same kind can not be chained.
    pub fn validate_next(&self, next: &Self) -> bool {
        self.is_connector() != next.is_connector()
    }

    fn set_args(&mut self, new_args: Args) {
        match self {
            Self::Connector { args, .. } | Self::Os { args, .. } => *args = Some(new_args),
        }
    }
}

fn split_step(input: &str) -> Result<(&str, Option<Args>)> {
    match input.split_once(':') {
        Some((name, args)) if !args.is_empty() => Ok((name, Some(str::parse(args)?))),
        Some((name, _)) => Ok((name, None)),
        None => Ok((input, None)),
    }
}

fn invalid_chain() -> Error {
    Error(ErrorOrigin::Other, ErrorKind::ArgValidation)
}

/// Orders positioned command line values and checks that connectors and os layers alternate.
fn steps_from_args<'a>(
    connectors: impl Iterator<Item = (usize, &'a str)>,
    os_layers: impl Iterator<Item = (usize, &'a str)>,
    ends_with_connector: bool,
) -> Result<Vec<BuildStep<'a>>> {
    let mut positioned = connectors
        .map(|(pos, s)| BuildStep::new_connector(s).map(|step| (pos, step)))
        .chain(os_layers.map(|(pos, s)| BuildStep::new_os(s).map(|step| (pos, step))))
        .collect::<Result<Vec<_>>>()?;
    positioned.sort_by_key(|(pos, _)| *pos);

    let steps: Vec<_> = positioned.into_iter().map(|(_, step)| step).collect();

    if steps.windows(2).any(|w| !w[0].validate_next(&w[1])) {
        return Err(invalid_chain().log_debug("two plugins of the same kind follow each other"));
    }

    match steps.last() {
        Some(last) if last.is_connector() == ends_with_connector => Ok(steps),
        _ => Err(invalid_chain().log_debug("the chain ends with the wrong kind of plugin")),
    }
}

/// Validated chain that ends with a connector, see [`BuilderEmpty::connector_chain`].
pub struct ConnectorChain<'a>(Vec<BuildStep<'a>>);

impl<'a> ConnectorChain<'a> {
    /// Builds the chain from `(position, "name:args")` pairs, as collected from command line
    /// arguments. Positions decide the order of the steps.
    pub fn new(
        connectors: impl Iterator<Item = (usize, &'a str)>,
        os_layers: impl Iterator<Item = (usize, &'a str)>,
    ) -> Result<Self> {
        steps_from_args(connectors, os_layers, true).map(Self)
    }
}

/// Validated chain that ends with an os, see [`BuilderEmpty::os_chain`].
pub struct OsChain<'a>(Vec<BuildStep<'a>>);

impl<'a> OsChain<'a> {
    /// Same as [`ConnectorChain::new`], the last step has to be an os.
    pub fn new(
        connectors: impl Iterator<Item = (usize, &'a str)>,
        os_layers: impl Iterator<Item = (usize, &'a str)>,
    ) -> Result<Self> {
        steps_from_args(connectors, os_layers, false).map(Self)
    }
}

/// Steps collected so far, shared by all builder states.
struct Chain<'a> {
    inventory: &'a Inventory,
    steps: Vec<BuildStep<'a>>,
}

impl<'a> Chain<'a> {
    fn push(mut self, step: BuildStep<'a>) -> Self {
        self.steps.push(step);
        self
    }

    fn with_args(mut self, args: Args) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.set_args(args);
        }
        self
    }

    /// Runs every step, feeding each instance into the next one. The first failure is returned
    /// as is.
    fn run(self) -> Result<Built> {
        self.steps
            .iter()
            .try_fold(Built::Nothing, |input, step| match step {
                BuildStep::Connector { name, args } => {
                    let os = match input {
                        Built::Os(os) => Some(os),
                        _ => None,
                    };
                    self.inventory
                        .create_connector(name, os, args.as_ref())
                        .map(Built::Connector)
                }
                BuildStep::Os { name, args } => {
                    let conn = match input {
                        Built::Connector(conn) => Some(conn),
                        _ => None,
                    };
                    self.inventory
                        .create_os(name, conn, args.as_ref())
                        .map(Built::Os)
                }
            })
    }
}

enum Built {
    Nothing,
    Connector(ConnectorInstance),
    Os(OsInstance),
}

fn empty_chain() -> Error {
    Error(ErrorOrigin::Inventory, ErrorKind::Configuration).log_error("nothing to build")
}

/// Start of a chain, returned by [`Inventory::builder`].
pub struct BuilderEmpty<'a> {
    inventory: &'a Inventory,
}

impl<'a> BuilderEmpty<'a> {
    pub(crate) fn new(inventory: &'a Inventory) -> Self {
        Self { inventory }
    }

    fn chain(self, steps: Vec<BuildStep<'a>>) -> Chain<'a> {
        Chain {
            inventory: self.inventory,
            steps,
        }
    }

    /// Starts the chain with the connector `name`.
    pub fn connector(self, name: &'a str) -> OsBuilder<'a> {
        OsBuilder(self.chain(vec![BuildStep::Connector { name, args: None }]))
    }

    /// Starts the chain with the os `name`, running without a connector input.
    pub fn os(self, name: &'a str) -> ConnectorBuilder<'a> {
        ConnectorBuilder(self.chain(vec![BuildStep::Os { name, args: None }]))
    }

    pub fn os_chain(self, chain: OsChain<'a>) -> ConnectorBuilder<'a> {
        ConnectorBuilder(self.chain(chain.0))
    }

    pub fn connector_chain(self, chain: ConnectorChain<'a>) -> OsBuilder<'a> {
        OsBuilder(self.chain(chain.0))
    }
}

/// Chain ending with an os. It builds an [`OsInstance`] or continues with a connector.
pub struct ConnectorBuilder<'a>(Chain<'a>);

impl<'a> ConnectorBuilder<'a> {
    /// Appends a connector that receives the os built so far.
    pub fn connector(self, name: &'a str) -> OsBuilder<'a> {
        OsBuilder(self.0.push(BuildStep::Connector { name, args: None }))
    }

    /// Sets the arguments of the last os.
    pub fn args(self, os_args: Args) -> Self {
        Self(self.0.with_args(os_args))
    }

    pub fn build(self) -> Result<OsInstance> {
        match self.0.run()? {
            Built::Os(os) => Ok(os),
            _ => Err(empty_chain()),
        }
    }
}

/// Chain ending with a connector. It builds a [`ConnectorInstance`] or continues with an os.
pub struct OsBuilder<'a>(Chain<'a>);

impl<'a> OsBuilder<'a> {
    /// Appends an os that runs on the connector built so far.
    pub fn os(self, name: &'a str) -> ConnectorBuilder<'a> {
        ConnectorBuilder(self.0.push(BuildStep::Os { name, args: None }))
    }

    /// Sets the arguments of the last connector.
    pub fn args(self, conn_args: Args) -> Self {
        Self(self.0.with_args(conn_args))
    }

    pub fn build(self) -> Result<ConnectorInstance> {
        match self.0.run()? {
            Built::Connector(conn) => Ok(conn),
            _ => Err(empty_chain()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_steps() {
        match BuildStep::new_connector("dummy:size=1m").unwrap() {
            BuildStep::Connector { name, args } => {
                assert_eq!(name, "dummy");
                assert_eq!(args.unwrap().get("size"), Some("1m"));
            }
            _ => panic!("expected a connector step"),
        }
        match BuildStep::new_os("dummy:").unwrap() {
            BuildStep::Os { name, args } => {
                assert_eq!(name, "dummy");
                assert!(args.is_none());
            }
            _ => panic!("expected an os step"),
        }
    }

    #[test]
    fn chains_must_alternate() {
        let conn = [(0, "a"), (2, "b")];
        let os = [(1, "x")];
        assert!(ConnectorChain::new(conn.into_iter(), os.into_iter()).is_ok());
        assert!(OsChain::new(conn.into_iter(), os.into_iter()).is_err());

        let conn = [(0, "a"), (1, "b")];
        assert!(ConnectorChain::new(conn.into_iter(), std::iter::empty()).is_err());
        assert!(OsChain::new(std::iter::empty(), std::iter::empty()).is_err());
    }
}
