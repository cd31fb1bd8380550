use log::Level;

/// Initializes the logger of the host process.
///
/// `level_num` ranges from 0 (errors only) to 4 (trace). Repeated calls keep the first logger.
#[no_mangle]
pub extern "C" fn log_init(level_num: i32) {
    let level = match level_num {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        4 => Level::Trace,
        _ => Level::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level.to_level_filter())
        .init()
        .ok();
}
