use env_logger::Builder;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the `env_logger` backend. Safe to call from every test; only
/// the first call takes effect.
pub fn init_log() {
    INIT.call_once(|| {
        let mut builder = Builder::from_default_env();
        builder
            .format_timestamp_millis()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} - {}] {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}
