/*!
Plugin library exposing the memcap dummy connector and os.

Build it and point an inventory at the output directory:

```sh
cargo build -p memcap-dummy
cargo run --example process_list -- -p target/debug -c dummy -o dummy:procs=5
```
*/

use core::ffi::c_void;

use log::info;

use memcap::dummy;
use memcap::error::Result;
use memcap::plugins::{Args, ConnectorInstance, OsInstance};
use memcap::types::COptArc;

fn create_connector(
    args: &Args,
    os: Option<OsInstance>,
    lib: COptArc<c_void>,
) -> Result<ConnectorInstance> {
    info!("creating dummy connector ({})", args);
    dummy::create_connector(args, os, lib)
}

fn create_os(
    args: &Args,
    conn: Option<ConnectorInstance>,
    lib: COptArc<c_void>,
) -> Result<OsInstance> {
    info!("creating dummy os ({})", args);
    dummy::create_os(args, conn, lib)
}

memcap::connector_plugin! {
    export: MEMCAP_CONNECTOR_DUMMY,
    name: "dummy",
    description: "in-memory physical memory for testing",
    create: create_connector,
    help: dummy::connector_help,
    target_list: dummy::target_list,
}

memcap::os_plugin! {
    export: MEMCAP_OS_DUMMY,
    name: "dummy",
    description: "simulated os with processes and modules for testing",
    create: create_os,
    help: dummy::os_help,
}
