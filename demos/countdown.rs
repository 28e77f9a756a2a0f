//! Runs a few bars to completion and prints each frame.
//!
//! ```text
//! RUST_LOG=bubbletea_timerbars=debug cargo run --example countdown
//! ```

use bubbletea_timerbars::prelude::*;
use bubbletea_timerbars::term;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut bars = BarManager::with_options(
        TerminalHost::new(),
        &[with_tick_period(Duration::from_millis(100))],
    );
    let pane = Pane::default();

    let cast = bars.create_bar("cast", &pane, None, None)?;
    cast.set_text("Frostbolt");
    cast.set_icon(Some("❄"));
    cast.set_duration(2.5);
    cast.set_fill(true);
    cast.set_bar_color("#5EA1FF");

    let buff = bars.create_bar("buff", &pane, None, None)?;
    buff.set_text("Arcane Intellect");
    buff.set_duration(4.0);

    bars.add_on_finish_callback("cast", |bars, status| {
        println!("{} finished after {:.1}s", status.id, status.elapsed);
        if let Ok(cooldown) = bars.create_bar("cooldown", &Pane::default(), Some(180.0), None) {
            cooldown.set_text("Frostbolt cooldown");
            cooldown.set_bar_color("#FF5F87");
            cooldown.set_duration(1.5);
        }
        bars.start("cooldown");
    });

    bars.start("cast");
    bars.start("buff");

    while !bars.is_empty() {
        thread::sleep(bars.scheduler().period());
        bars.tick();
        println!("{}\n", term::view(&bars));
    }
    Ok(())
}
