use std::fs;
use std::path::{Path, PathBuf};

use memcap::dummy;
use memcap::prelude::v1::*;

memcap::connector_plugin! {
    export: INVENTORY_CONNECTOR,
    name: "dummy",
    description: "dummy connector used by the inventory tests",
    create: dummy::create_connector,
    help: dummy::connector_help,
    target_list: dummy::target_list,
}

memcap::os_plugin! {
    export: INVENTORY_OS,
    name: "dummy",
    description: "dummy os used by the inventory tests",
    create: dummy::create_os,
    help: dummy::os_help,
}

fn inventory() -> Inventory {
    let mut inventory = Inventory::empty();
    inventory
        .add_connector_descriptor(INVENTORY_CONNECTOR)
        .unwrap()
        .add_os_descriptor(INVENTORY_OS)
        .unwrap();
    inventory
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("memcap-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn registered_plugins_are_listed() {
    let mut inventory = inventory();
    assert_eq!(inventory.available_connectors(), vec!["dummy"]);
    assert_eq!(inventory.available_os(), vec!["dummy"]);

    assert_eq!(
        inventory.add_os_descriptor(INVENTORY_OS).err(),
        Some(Error(ErrorOrigin::Inventory, ErrorKind::AlreadyExists))
    );
    assert_eq!(inventory.available_os().len(), 1);
}

#[test]
fn help_and_targets() {
    let inventory = inventory();

    assert!(inventory.connector_help("dummy").unwrap().contains("size"));
    assert!(inventory.os_help("dummy").unwrap().contains("procs"));

    let targets = inventory.connector_target_list("dummy").unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name, "dummy");

    assert_eq!(
        inventory.connector_help("qemu").err(),
        Some(Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound))
    );
}

#[test]
fn builder_connector_then_os() {
    let inventory = inventory();
    let mut os = inventory
        .builder()
        .connector("dummy")
        .args(str::parse("size=4m").unwrap())
        .os("dummy")
        .args(str::parse("procs=2,seed=9").unwrap())
        .build()
        .unwrap();

    assert_eq!(os.metadata().real_size, size::mb(4));
    assert_eq!(os.process_info_list().unwrap().len(), 2);
}

#[test]
fn builder_os_then_connector() {
    let inventory = inventory();
    let mut conn = inventory
        .builder()
        .os("dummy")
        .args(str::parse("procs=1").unwrap())
        .connector("dummy")
        .build()
        .unwrap();

    assert!(!conn.has_cpu_state());
    conn.phys_write(0x20_u64.into(), &0x55_u8).unwrap();
    assert_eq!(conn.phys_read::<u8>(0x20_u64.into()).unwrap(), 0x55);
}

#[test]
fn builder_reports_the_failing_step() {
    let inventory = inventory();
    assert_eq!(
        inventory
            .builder()
            .connector("dummy")
            .os("win32")
            .build()
            .err(),
        Some(Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound))
    );
}

#[test]
fn chains_from_positions() {
    let inventory = inventory();

    let chain = OsChain::new(
        [(0, "dummy:size=4m")].into_iter(),
        [(1, "dummy:procs=2")].into_iter(),
    )
    .unwrap();
    let mut os = inventory.builder().os_chain(chain).build().unwrap();
    assert_eq!(os.process_info_list().unwrap().len(), 2);

    let chain = ConnectorChain::new(
        [(0, "dummy:2m"), (2, "dummy")].into_iter(),
        [(1, "dummy:procs=1")].into_iter(),
    )
    .unwrap();
    let conn = inventory.builder().connector_chain(chain).build().unwrap();
    assert_eq!(conn.metadata().real_size, size::mb(2));
}

#[test]
fn chains_validate_the_order() {
    assert_eq!(
        OsChain::new([(0, "dummy"), (1, "dummy")].into_iter(), [].into_iter()).err(),
        Some(Error(ErrorOrigin::Other, ErrorKind::ArgValidation))
    );
    assert!(OsChain::new([(1, "dummy")].into_iter(), [(0, "dummy")].into_iter()).is_err());
    assert!(ConnectorChain::new([(0, "dummy")].into_iter(), [(1, "dummy")].into_iter()).is_err());
}

#[test]
fn scan_path_requires_a_directory() {
    let dir = scratch_dir("scan-file");
    let file = dir.join("not-a-dir.txt");
    fs::write(&file, b"memcap").unwrap();

    assert_eq!(
        Inventory::scan_path(&file).err(),
        Some(Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath))
    );
    assert_eq!(
        Inventory::scan_path(dir.join("missing")).err(),
        Some(Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath))
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn scan_path_skips_foreign_files() {
    let dir = scratch_dir("scan-foreign");
    fs::write(dir.join("libnotes.so"), b"this is not a library").unwrap();
    fs::write(dir.join("readme.md"), b"# plugins").unwrap();

    let mut inventory = Inventory::scan_path(&dir).unwrap();
    assert!(inventory.available_connectors().is_empty());
    assert!(inventory.available_os().is_empty());
    assert_eq!(inventory.dirs(), &[dir.canonicalize().unwrap()]);

    inventory.add_dir(dir.clone()).unwrap();
    assert_eq!(inventory.dirs().len(), 1);

    fs::remove_dir_all(&dir).ok();
}

fn built_plugin() -> Option<PathBuf> {
    let name = format!(
        "{}memcap_dummy{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    );
    let target = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("target");
    ["debug", "release"]
        .iter()
        .map(|profile| target.join(profile).join(&name))
        .find(|path| path.is_file())
}

#[test]
fn loads_the_dummy_plugin_library() {
    let lib = match built_plugin() {
        Some(lib) => lib,
        None => return,
    };

    let dir = scratch_dir("scan-lib");
    fs::copy(&lib, dir.join(lib.file_name().unwrap())).unwrap();

    let inventory = Inventory::scan_path(&dir).unwrap();
    assert_eq!(inventory.available_connectors(), vec!["dummy"]);
    assert_eq!(inventory.available_os(), vec!["dummy"]);

    let mut os = inventory
        .builder()
        .connector("dummy")
        .os("dummy")
        .args(str::parse("procs=2").unwrap())
        .build()
        .unwrap();
    std::mem::drop(inventory);

    // the instance keeps the library mapped on its own
    let mut proc = os.process_by_name("svchost.exe").unwrap();
    assert!(proc.module_by_name("kernel32").is_ok());

    fs::remove_dir_all(&dir).ok();
}
