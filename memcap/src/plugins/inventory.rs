/*!
Discovery and instantiation of plugin libraries.
*/

use core::ffi::c_void;
use std::fs::read_dir;
use std::path::{Path, PathBuf};

use libloading::Library;
use log::{debug, error, info, warn, LevelFilter};
use once_cell::sync::OnceCell;

use super::builder::BuilderEmpty;
use super::{
    util, Args, ConnectorDescriptor, ConnectorInstance, Loadable, LoadableConnector, LoadableOs,
    OsDescriptor, OsInstance, PluginDescriptor, PluginError, PluginLogger, TargetInfo,
    PLUGIN_FOLDER,
};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::{CArc, COptArc};

/// A mapped plugin library and the logger handed to it.
///
/// Instances keep an opaque reference to this, the library stays mapped until the last one is
/// dropped.
pub struct LibContext {
    lib: Library,
    logger: OnceCell<Box<PluginLogger>>,
}

impl From<Library> for LibContext {
    fn from(lib: Library) -> Self {
        Self {
            lib,
            logger: Default::default(),
        }
    }
}

impl LibContext {
    /// Logger for the library, created on first use.
    ///
    /// # Safety
    ///
    /// The lifetime is a lie, the logger lives as long as this context. Only hand it to code of
    /// the library itself, which can not outlive the context either.
    pub unsafe fn get_logger(&self) -> &'static PluginLogger {
        let boxed = self.logger.get_or_init(Default::default);
        &*(boxed.as_ref() as *const PluginLogger)
    }

    pub fn try_get_logger(&self) -> Option<&PluginLogger> {
        self.logger.get().map(|l| &**l)
    }
}

/// One plugin of an inventory.
///
/// `library` is `None` for descriptors registered from the current process.
#[derive(Clone)]
pub struct LibInstance<T> {
    path: PathBuf,
    library: Option<CArc<LibContext>>,
    loader: T,
}

impl<T: Loadable> LibInstance<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loader(&self) -> &T {
        &self.loader
    }

    fn ident(&self) -> &str {
        self.loader.ident()
    }

    fn from_descriptor(
        path: PathBuf,
        library: Option<CArc<LibContext>>,
        descriptor: PluginDescriptor<T>,
    ) -> Result<Self> {
        let loader = T::new(descriptor);
        loader.verify()?;
        Ok(Self {
            path,
            library,
            loader,
        })
    }

    /// Reads the descriptor behind the `export` symbol of an already mapped library.
    fn from_export(path: &Path, library: &CArc<LibContext>, export: &str) -> Result<Self> {
        let symbol_name = [export.as_bytes(), b"\0"].concat();
        // the symbol is the address of a `PluginDescriptor<T>` static
        let descriptor = unsafe {
            library
                .lib
                .get::<*const PluginDescriptor<T>>(&symbol_name)
                .map(|symbol| symbol.read())
        }
        .map_err(|_| Error(ErrorOrigin::Inventory, ErrorKind::ExportsNotFound))?;

        Self::from_descriptor(path.to_path_buf(), Some(library.clone()), descriptor)
    }

    /// Maps the library at `path` and loads every plugin of this type it exports.
    ///
    /// The symbol table is checked before the library is mapped, files without matching exports
    /// never get loaded.
    fn from_library(path: &Path) -> Result<Vec<Self>> {
        let exports = util::find_export_by_prefix(path, T::export_prefix())?;
        if exports.is_empty() {
            return Err(Error(ErrorOrigin::Inventory, ErrorKind::ExportsNotFound));
        }

        let library = match unsafe { Library::new(path) } {
            Ok(lib) => CArc::from(LibContext::from(lib)),
            Err(err) => {
                debug!("{:?} exports {:?} but failed to load: {}", path, exports, err);
                return Err(Error(ErrorOrigin::Inventory, ErrorKind::UnableToLoadLibrary));
            }
        };

        Ok(exports
            .iter()
            .filter_map(|export| match Self::from_export(path, &library, export) {
                Ok(lib) => Some(lib),
                Err(err) => {
                    debug!("ignoring {} in {:?}: {}", export, path, err);
                    None
                }
            })
            .collect())
    }

    /// Adds `self` unless a plugin of the same name is registered already.
    fn register(self, libs: &mut Vec<Self>) -> Result<()> {
        if libs.iter().any(|lib| lib.ident() == self.ident()) {
            debug!(
                "{} plugin {} from {:?} is shadowed by an earlier one",
                T::plugin_type(),
                self.ident(),
                self.path
            );
            return Err(Error(ErrorOrigin::Inventory, ErrorKind::AlreadyExists));
        }

        info!("found {} plugin {} in {:?}", T::plugin_type(), self.ident(), self.path);
        libs.push(self);
        Ok(())
    }

    fn instantiate(
        &self,
        input: Option<T::Input>,
        args: Option<&Args>,
    ) -> core::result::Result<T::Instance, PluginError> {
        info!(
            "instantiating {} plugin {} ({:?})",
            T::plugin_type(),
            self.ident(),
            self.path,
        );

        // the instance holds `ctx`, which keeps the logger alive
        let logger = match &self.library {
            Some(library) => Some(unsafe { library.get_logger() }),
            None => None,
        };
        let ctx: COptArc<c_void> = self.library.clone().map(CArc::into_opaque).into();

        self.loader.instantiate(ctx, logger, input, args)
    }
}

/// Registry of the connector and os plugins found on the system.
///
/// Plugins are looked up by name. A library stays mapped while the inventory or any instance
/// created from it exists.
///
/// # Examples
///
/// ```no_run
/// use memcap::plugins::Inventory;
/// # use memcap::plugins::OsInstance;
/// # use memcap::error::Result;
/// # fn test() -> Result<OsInstance> {
/// let inventory = Inventory::scan();
/// inventory
///   .builder()
///   .connector("dummy")
///   .os("dummy")
///   .build()
/// # }
/// # test().ok();
/// ```
pub struct Inventory {
    dirs: Vec<PathBuf>,
    connectors: Vec<LibInstance<LoadableConnector>>,
    os_layers: Vec<LibInstance<LoadableOs>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::empty()
    }
}

impl Inventory {
    pub fn empty() -> Self {
        Self {
            dirs: Vec::new(),
            connectors: Vec::new(),
            os_layers: Vec::new(),
        }
    }

    /// Inventory of the plugins in a single directory.
    ///
    /// Fails with `InvalidPath` if `path` is not a directory.
    pub fn scan_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut inventory = Self::empty();
        inventory.add_dir(path.as_ref().to_path_buf())?;
        Ok(inventory)
    }

    /// Inventory of the plugins installed on the system.
    ///
    /// A `memcap` subdirectory is looked for in every [search root](search_roots) and scanned if
    /// it exists. The working directory is scanned directly. Directories that can not be read are
    /// skipped.
    pub fn scan() -> Self {
        let mut inventory = Self::empty();

        for root in search_roots() {
            inventory.add_dir(root.join(PLUGIN_FOLDER)).ok();
        }

        if let Ok(cwd) = std::env::current_dir() {
            inventory.add_dir(cwd).ok();
        }

        inventory
    }

    /// Scans `dir`, only looking at files whose name contains `filter`.
    ///
    /// Unlike [`add_dir`](Self::add_dir) the directory is not remembered, so it can be scanned
    /// again with a different filter.
    pub fn add_dir_filtered(&mut self, dir: PathBuf, filter: &str) -> Result<&mut Self> {
        if !dir.is_dir() {
            return Err(Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath));
        }

        info!("scanning {:?} for plugins", dir);

        let entries =
            read_dir(dir).map_err(|_| Error(ErrorOrigin::Inventory, ErrorKind::UnableToReadDir))?;
        for entry in entries {
            let entry = entry
                .map_err(|_| Error(ErrorOrigin::Inventory, ErrorKind::UnableToReadDirEntry))?;
            let matches = entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.contains(filter));
            let path = entry.path();
            if matches && path.is_file() {
                self.load(path);
            }
        }

        Ok(self)
    }

    /// Scans `dir` for plugins.
    ///
    /// Directories are remembered by their canonical path, scanning one twice does nothing.
    pub fn add_dir(&mut self, dir: PathBuf) -> Result<&mut Self> {
        let canonical = dir
            .canonicalize()
            .map_err(|_| Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath))?;

        if self.dirs.contains(&canonical) {
            debug!("{:?} was scanned already", dir);
            return Ok(self);
        }

        self.add_dir_filtered(canonical.clone(), "")?;
        self.dirs.push(canonical);
        Ok(self)
    }

    /// Loads the plugins exported by the library at `path`.
    ///
    /// Anything that is not a library with memcap exports is ignored. Loading runs the library's
    /// initializers, which is only as safe as the library itself.
    pub fn load(&mut self, path: PathBuf) -> &mut Self {
        Self::register_all(&path, &mut self.connectors);
        Self::register_all(&path, &mut self.os_layers);
        self
    }

    fn register_all<T: Loadable>(path: &Path, libs: &mut Vec<LibInstance<T>>) {
        if let Ok(found) = LibInstance::from_library(path) {
            for lib in found {
                lib.register(libs).ok();
            }
        }
    }

    /// Registers a connector descriptor that lives in the current process.
    pub fn add_connector_descriptor(&mut self, descriptor: ConnectorDescriptor) -> Result<&mut Self> {
        Self::add_descriptor(&mut self.connectors, descriptor)?;
        Ok(self)
    }

    /// Registers an os descriptor that lives in the current process.
    pub fn add_os_descriptor(&mut self, descriptor: OsDescriptor) -> Result<&mut Self> {
        Self::add_descriptor(&mut self.os_layers, descriptor)?;
        Ok(self)
    }

    fn add_descriptor<T: Loadable>(
        libs: &mut Vec<LibInstance<T>>,
        descriptor: PluginDescriptor<T>,
    ) -> Result<()> {
        LibInstance::from_descriptor(PathBuf::new(), None, descriptor)?.register(libs)
    }

    /// Returns the canonical paths of all scanned directories.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Names of the registered connectors, in registration order.
    pub fn available_connectors(&self) -> Vec<String> {
        Self::idents(&self.connectors)
    }

    /// Names of the registered os plugins, in registration order.
    pub fn available_os(&self) -> Vec<String> {
        Self::idents(&self.os_layers)
    }

    /// Help text of a connector. Fails with `NotSupported` if it has none.
    pub fn connector_help(&self, name: &str) -> Result<String> {
        Self::find(&self.connectors, name)?.loader.help()
    }

    /// Help text of an os plugin. Fails with `NotSupported` if it has none.
    pub fn os_help(&self, name: &str) -> Result<String> {
        Self::find(&self.os_layers, name)?.loader.help()
    }

    /// Targets a connector can attach to. Fails with `NotSupported` if it can not list them.
    pub fn connector_target_list(&self, name: &str) -> Result<Vec<TargetInfo>> {
        Self::find(&self.connectors, name)?.loader.target_list()
    }

    fn idents<T: Loadable>(libs: &[LibInstance<T>]) -> Vec<String> {
        libs.iter().map(|lib| lib.ident().to_owned()).collect()
    }

    fn find<'a, T: Loadable>(libs: &'a [LibInstance<T>], name: &str) -> Result<&'a LibInstance<T>> {
        match libs.iter().find(|lib| lib.ident() == name) {
            Some(lib) => Ok(lib),
            None => {
                error!(
                    "no {} plugin named {}, known ones: [{}]",
                    T::plugin_type(),
                    name,
                    Self::idents(libs).join(", ")
                );
                Err(Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound))
            }
        }
    }

    /// Starts a [builder](BuilderEmpty) for a connector/os chain.
    ///
    /// ```no_run
    /// use memcap::plugins::{Inventory, Args};
    ///
    /// let inventory = Inventory::scan();
    /// let os = inventory
    ///   .builder()
    ///   .connector("dummy")
    ///   .args(str::parse("size=16m").unwrap())
    ///   .os("dummy")
    ///   .build();
    /// ```
    pub fn builder(&self) -> BuilderEmpty {
        BuilderEmpty::new(self)
    }

    /// Instantiates the connector `name`, optionally on top of an os.
    ///
    /// A message the plugin attached to a failure is logged as a warning, use
    /// [`try_create_connector`](Self::try_create_connector) to receive it instead.
    pub fn create_connector(
        &self,
        name: &str,
        input: Option<OsInstance>,
        args: Option<&Args>,
    ) -> Result<ConnectorInstance> {
        self.try_create_connector(name, input, args)
            .map_err(Self::log_plugin_error)
    }

    /// Instantiates the os plugin `name`, usually on top of a connector.
    ///
    /// Failure messages are handled like in [`create_connector`](Self::create_connector).
    pub fn create_os(
        &self,
        name: &str,
        input: Option<ConnectorInstance>,
        args: Option<&Args>,
    ) -> Result<OsInstance> {
        self.try_create_os(name, input, args)
            .map_err(Self::log_plugin_error)
    }

    /// [`create_connector`](Self::create_connector) returning the plugin message with the error.
    pub fn try_create_connector(
        &self,
        name: &str,
        input: Option<OsInstance>,
        args: Option<&Args>,
    ) -> core::result::Result<ConnectorInstance, PluginError> {
        Self::find(&self.connectors, name)?.instantiate(input, args)
    }

    /// [`create_os`](Self::create_os) returning the plugin message with the error.
    pub fn try_create_os(
        &self,
        name: &str,
        input: Option<ConnectorInstance>,
        args: Option<&Args>,
    ) -> core::result::Result<OsInstance, PluginError> {
        Self::find(&self.os_layers, name)?.instantiate(input, args)
    }

    fn log_plugin_error(err: PluginError) -> Error {
        if let Some(message) = &err.message {
            warn!("{}", message);
        }
        err.error
    }

    /// Changes the max log level of the host and of every loaded library that installed its
    /// [`PluginLogger`].
    pub fn set_max_log_level(&self, level: LevelFilter) {
        log::set_max_level(level);

        let connector_libs = self.connectors.iter().filter_map(|c| c.library.as_ref());
        let os_libs = self.os_layers.iter().filter_map(|o| o.library.as_ref());
        for logger in connector_libs
            .chain(os_libs)
            .filter_map(|lib| lib.try_get_logger())
        {
            logger.on_level_change(level);
        }
    }
}

/// Directories whose `memcap` subdirectory [`Inventory::scan`] looks at.
///
/// The common library directories on unix, every entry of `PATH` and `~/.local/lib`. Elsewhere
/// the documents directory replaces the unix list.
pub fn search_roots() -> Vec<PathBuf> {
    #[cfg(unix)]
    let mut roots: Vec<PathBuf> = [
        "/opt",
        "/lib",
        "/lib32",
        "/lib64",
        "/usr/lib",
        "/usr/lib32",
        "/usr/lib64",
        "/usr/local/lib",
        "/usr/local/lib32",
        "/usr/local/lib64",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    #[cfg(not(unix))]
    let mut roots: Vec<PathBuf> = dirs::document_dir().into_iter().collect();

    if let Some(path) = std::env::var_os("PATH") {
        roots.extend(std::env::split_paths(&path));
    }
    roots.extend(dirs::home_dir().map(|home| home.join(".local").join("lib")));
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("memcap-inventory-{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn scan_path_requires_directory() {
        let dir = temp_dir("file");
        let file = dir.join("plain.txt");
        std::fs::write(&file, b"hello").unwrap();

        assert_eq!(
            Inventory::scan_path(&file).err(),
            Some(Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath))
        );
        assert_eq!(
            Inventory::scan_path(dir.join("missing")).err(),
            Some(Error(ErrorOrigin::Inventory, ErrorKind::InvalidPath))
        );
    }

    #[test]
    fn foreign_files_are_skipped() {
        let dir = temp_dir("foreign");
        std::fs::write(dir.join("libnot_a_plugin.so"), b"garbage").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();

        let inventory = Inventory::scan_path(&dir).unwrap();
        assert!(inventory.available_connectors().is_empty());
        assert!(inventory.available_os().is_empty());
    }

    #[test]
    fn add_dir_deduplicates() {
        let dir = temp_dir("dedup");
        let mut inventory = Inventory::empty();
        inventory.add_dir(dir.clone()).unwrap();
        inventory.add_dir(dir.join(".")).unwrap();
        assert_eq!(inventory.dirs().len(), 1);
    }

    #[test]
    fn search_roots_include_local_lib() {
        if let Some(home) = dirs::home_dir() {
            assert!(search_roots().contains(&home.join(".local").join("lib")));
        }
    }

    #[test]
    fn unknown_plugin() {
        let inventory = Inventory::empty();
        assert_eq!(
            inventory.create_connector("nope", None, None).err(),
            Some(Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound))
        );
        assert_eq!(
            inventory.os_help("nope").err(),
            Some(Error(ErrorOrigin::Inventory, ErrorKind::PluginNotFound))
        );
    }
}
