use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the defaults; dev mode
/// prints human-readable lines, otherwise one JSON object per event.
pub fn init(is_dev: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_dev {
            EnvFilter::new("debug,hyper=info,reqwest=info")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if is_dev {
        registry.with(fmt::layer().with_target(true)).try_init()
    } else {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    };

    if let Err(err) = result {
        eprintln!("logging already initialised: {err}");
    }
}
