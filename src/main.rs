use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info};

use handscroll::app::HandScrollApp;
use handscroll::args::Args;
use handscroll::config::{LiveConfig, Settings};
use handscroll::tracker;
use handscroll::utils::{wait_for_line, State};
use handscroll::webcam::list_devices;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.list {
        let devices = list_devices();
        if devices.is_empty() {
            println!("No cameras found");
        }
        for (index, name) in devices.iter().enumerate() {
            println!("{}: {}", index, name);
        }
        return Ok(());
    }

    let settings = Settings::load(args.config.as_deref())?.apply_args(&args)?;
    info!(
        "Mode {}, threshold {} px, speed {}",
        settings.mode, settings.click_threshold, settings.scroll_speed
    );

    let config = Arc::new(LiveConfig::from_settings(&settings));
    let shared_state = Arc::new(Mutex::new(State::default()));
    let stop = Arc::new(AtomicBool::new(false));

    let worker = tracker::spawn(
        settings,
        args.dry_run,
        config.clone(),
        shared_state.clone(),
        stop.clone(),
    )?;

    let result = if args.headless {
        info!("Running headless, press Enter to stop");
        match wait_for_line(io::stdin().lock()) {
            Ok(true) => Ok(()),
            Ok(false) => {
                info!("stdin is closed, running until the process is killed");
                loop {
                    thread::park();
                }
            }
            Err(e) => Err(e.into()),
        }
    } else {
        let app_stop = stop.clone();
        eframe::run_native(
            "Hand Gesture Scroller",
            eframe::NativeOptions::default(),
            Box::new(move |cc| Box::new(HandScrollApp::new(cc, config, shared_state, app_stop))),
        )
        .map_err(|e| anyhow!("{}", e))
    };

    stop.store(true, Ordering::Relaxed);
    if worker.join().is_err() {
        error!("Tracker thread panicked");
    }

    info!("Stopped");
    result
}
