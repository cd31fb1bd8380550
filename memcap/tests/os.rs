use memcap::architecture::x86::{x32, x64};
use memcap::dummy::{DummyMemory, DummyOs};
use memcap::prelude::v1::*;

fn os(procs: &[&str]) -> OsInstance {
    let mut os = DummyOs::with_seed(DummyMemory::new(size::mb(32)), 11);
    for name in procs {
        os.alloc_process_named(name, size::kb(64), &[]).unwrap();
    }
    os.press_key(0x41);
    OsInstance::builder(os).enable_keyboard().build()
}

#[test]
fn callback_stops_when_asked() {
    let mut os = os(&["a.exe", "b.exe", "c.exe", "d.exe"]);
    assert_eq!(os.process_info_list().unwrap().len(), 4);

    let mut seen = vec![];
    os.process_info_list_callback(
        (&mut |info: ProcessInfo| {
            seen.push(info.pid);
            false
        })
            .into(),
    )
    .unwrap();
    assert_eq!(seen.len(), 1);

    let mut addrs = 0;
    os.process_address_list_callback(
        (&mut |_| {
            addrs += 1;
            addrs < 2
        })
            .into(),
    )
    .unwrap();
    assert_eq!(addrs, 2);
}

#[test]
fn process_lookups() {
    let mut os = os(&["explorer.exe", "svchost.exe", "svchost.exe"]);
    let list = os.process_info_list().unwrap();

    let by_name = os.process_info_by_name("svchost.exe").unwrap();
    assert_eq!(by_name.pid, list[1].pid);

    let by_pid = os.process_info_by_pid(list[2].pid).unwrap();
    assert_eq!(by_pid.address, list[2].address);

    let by_address = os.process_info_by_address(list[0].address).unwrap();
    assert_eq!(by_address.name, "explorer.exe");
    assert_eq!(by_address.path, "C:\\dummy\\explorer.exe");

    assert_eq!(
        os.process_info_by_name("lsass.exe").err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))
    );
    assert_eq!(
        os.process_info_by_pid(0xdead).err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::ProcessNotFound))
    );
}

#[test]
fn module_addresses_resolve() {
    let mut os = os(&["notepad.exe"]);
    let mut proc = os.process_by_name("notepad.exe").unwrap();

    let mut addrs = vec![];
    proc.module_address_list_callback(None, (&mut addrs).into())
        .unwrap();
    assert_eq!(addrs.len(), 3);

    let kernel32 = proc.module_by_name("kernel32").unwrap();
    assert!(addrs.iter().any(|a| a.address == kernel32.address));
    assert_eq!(kernel32.path, "C:\\Windows\\System32\\kernel32.dll");

    let resolved = proc
        .module_by_address(kernel32.address, kernel32.arch)
        .unwrap();
    assert_eq!(resolved.base, kernel32.base);

    let first = proc.virt_page_info(kernel32.base).unwrap();
    let last = proc
        .virt_page_info(kernel32.base + (kernel32.size - 1))
        .unwrap();
    assert!(first.page_base <= kernel32.base);
    assert!(kernel32.base + kernel32.size <= last.page_base + last.page_size);
    assert_eq!(proc.virt_read::<[u8; 2]>(kernel32.base).unwrap(), *b"MZ");

    assert_eq!(
        proc.module_by_name("user32").err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::ModuleNotFound))
    );
}

#[test]
fn primary_module_is_the_image() {
    let mut os = os(&["cmd.exe"]);
    let mut proc = os.process_by_name("cmd.exe").unwrap();

    let primary = proc.primary_module().unwrap();
    assert_eq!(primary.name, "cmd.exe");
    assert_eq!(primary.parent_process, proc.info().address);
    assert_eq!(primary.arch, proc.info().proc_arch);
}

#[test]
fn symbols_through_the_bundle() {
    let mut os = os(&["cmd.exe"]);
    let mut proc = os.process_by_name("cmd.exe").unwrap();

    let image = proc.primary_module().unwrap();
    let imports = proc.module_import_list(&image).unwrap();
    assert!(imports.iter().any(|i| i.name == "LoadLibraryA"));

    let ntdll = proc.module_by_name("ntdll").unwrap();
    let exports = proc.module_export_list(&ntdll).unwrap();
    assert_eq!(exports.len(), 3);
    assert_eq!(
        proc.module_export_by_name(&ntdll, "NtClose").unwrap().offset,
        0x1010
    );

    let sections = proc.module_section_list(&ntdll).unwrap();
    assert!(sections.iter().any(|s| s.name == ".text"));
    assert!(sections.iter().all(|s| ntdll.contains(s.base)));
}

#[test]
fn emulated_process_lists_both_architectures() {
    let mut os = DummyOs::with_seed(DummyMemory::new(size::mb(32)), 5);
    let pid = os
        .alloc_process_with_arch("game.exe", size::kb(64), &[], x32::ARCH.ident())
        .unwrap();
    let mut os = OsInstance::builder(os).build();
    let mut proc = os.process_by_pid(pid).unwrap();

    let info = proc.info().clone();
    assert_eq!(info.proc_arch, x32::ARCH.ident());
    assert_eq!(info.sys_arch, x64::ARCH.ident());

    let native = proc.module_list().unwrap();
    assert!(native.iter().all(|m| m.arch == info.proc_arch));

    let system = proc.module_list_arch(Some(&info.sys_arch)).unwrap();
    assert!(system.iter().any(|m| m.name == "wow64"));
    assert!(system.iter().all(|m| m.arch == info.sys_arch));
}

#[test]
fn dead_processes_stay_listed() {
    let mut os = DummyOs::new(DummyMemory::new(size::mb(16)));
    let first = os.alloc_process_named("worker.exe", size::kb(16), &[]).unwrap();
    let second = os.alloc_process_named("worker.exe", size::kb(16), &[]).unwrap();
    os.kill_process(first, 1).unwrap();
    let mut os = OsInstance::builder(os).build();

    assert_eq!(os.process_info_list().unwrap().len(), 2);
    assert_eq!(os.process_info_by_name("worker.exe").unwrap().pid, second);

    let mut dead = os.process_by_pid(first).unwrap();
    assert_eq!(dead.state(), ProcessState::Dead(1));
}

#[test]
fn kernel_modules_through_the_bundle() {
    let mut os = os(&[]);
    let base = os.info().base;

    let modules = os.module_list().unwrap();
    assert_eq!(
        modules.iter().map(|m| m.name.to_string()).collect::<Vec<_>>(),
        vec!["ntoskrnl", "hal"]
    );
    assert_eq!(os.module_by_name("ntoskrnl").unwrap().base, base);
    assert_eq!(os.virt_read::<[u8; 2]>(base).unwrap(), *b"MZ");
}

#[test]
fn keyboard_snapshot() {
    let mut os = os(&[]);
    assert!(os.has_keyboard());

    let mut keyboard = os.keyboard().unwrap();
    assert!(keyboard.is_down(0x41));
    assert!(!keyboard.is_down(0x42));

    let state = keyboard.state().unwrap();
    keyboard.set_down(0x42, true);
    assert!(keyboard.is_down(0x42));
    assert!(!state.is_down(0x42));
    assert!(state.is_down(0x41));
}

#[test]
fn keyboard_is_optional() {
    let mut os = OsInstance::builder(DummyOs::new(DummyMemory::new(size::mb(4)))).build();
    assert!(!os.has_keyboard());
    assert_eq!(
        os.keyboard().err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::UnsupportedOptionalFeature))
    );
}

/// Reports an extra process structure at `stale` that no longer resolves.
struct StaleEntry {
    os: DummyOs<DummyMemory>,
    stale: Address,
    at: usize,
}

impl OsInner for StaleEntry {
    type ProcessType<'a> = <DummyOs<DummyMemory> as OsInner>::ProcessType<'a>;
    type IntoProcessType = <DummyOs<DummyMemory> as OsInner>::IntoProcessType;

    fn process_address_list_callback(&mut self, mut callback: AddressCallback) -> Result<()> {
        let mut addrs = self.os.process_address_list()?;
        addrs.insert(self.at, self.stale);
        callback.feed(addrs);
        Ok(())
    }

    fn process_info_by_address(&mut self, address: Address) -> Result<ProcessInfo> {
        if address == self.stale {
            return Err(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidProcessInfo));
        }
        self.os.process_info_by_address(address)
    }

    fn process_by_info(&mut self, info: ProcessInfo) -> Result<Self::ProcessType<'_>> {
        self.os.process_by_info(info)
    }

    fn into_process_by_info(self, info: ProcessInfo) -> Result<Self::IntoProcessType> {
        self.os.into_process_by_info(info)
    }

    fn module_address_list_callback(&mut self, callback: AddressCallback) -> Result<()> {
        self.os.module_address_list_callback(callback)
    }

    fn module_by_address(&mut self, address: Address) -> Result<ModuleInfo> {
        self.os.module_by_address(address)
    }

    fn info(&self) -> &OsInfo {
        self.os.info()
    }
}

#[test]
fn process_walk_ends_at_unresolvable_entry() {
    let mut inner = DummyOs::with_seed(DummyMemory::new(size::mb(16)), 3);
    for name in ["a.exe", "b.exe", "c.exe"] {
        inner.alloc_process_named(name, size::kb(16), &[]).unwrap();
    }
    let mut os = StaleEntry {
        os: inner,
        stale: Address::from(0xdead0000u64),
        at: 1,
    };

    let mut seen = vec![];
    let res = os.process_info_list_callback(
        (&mut |info: ProcessInfo| {
            seen.push(info.name.to_string());
            true
        })
            .into(),
    );
    assert_eq!(
        res,
        Err(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidProcessInfo))
    );
    assert_eq!(seen, vec!["a.exe"]);

    assert_eq!(
        os.process_info_list().err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidProcessInfo))
    );
    // the lookup stops at the same entry
    assert_eq!(
        os.process_info_by_name("c.exe").err(),
        Some(Error(ErrorOrigin::OsLayer, ErrorKind::InvalidProcessInfo))
    );
    assert_eq!(os.process_info_by_name("a.exe").unwrap().name, "a.exe");
}
