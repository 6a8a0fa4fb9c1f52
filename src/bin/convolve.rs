use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use rtconvolve::config::EngineSettings;
use rtconvolve::host::jack_adapter::JackHost;
use rtconvolve::host::wav::load_ir;

#[derive(Parser, Debug)]
#[command(name = "rtconvolve")]
#[command(author = "rtconvolve")]
#[command(version = "0.1")]
#[command(about = "Real-time partitioned-FFT convolution engine.")]
struct Args {
    #[arg(long, help = "Path to a WAV impulse response; defaults to a Dirac pulse")]
    ir: Option<String>,
    #[arg(long, env = "RTCONVOLVE_GAIN", default_value_t = 1.0, help = "Output gain")]
    gain: f32,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    info!("rtconvolve v{}", env!("CARGO_PKG_VERSION"));
    info!(
        r#"
            __                            _
  _ __ ___ / _| ___ ___  _ ____   _____ | |_   _____
 | '__/ __| |_ / __/ _ \| '_ \ \ / / _ \| \ \ / / _ \
 | |  \__ \  _| (_| (_) | | | \ V / (_) | |\ V /  __/
 |_|  |___/_|  \___\___/|_| |_|\_/ \___/|_| \_/ \___|
    "#
    );
    info!("Args: {:?}", args);

    let mut settings = EngineSettings::load().context("failed to load settings")?;
    if let Some(ir_path) = &args.ir {
        settings.ir_path = Some(ir_path.clone());
    }

    let (host, reload) = JackHost::new(None, Some(settings.max_head_partitions), args.gain)
        .context("failed to start JACK host")?;
    info!(
        "JACK client ready: block_size={}, sample_rate={}",
        host.block_size(),
        host.sample_rate()
    );

    if let Some(ir_path) = &settings.ir_path {
        // Fail fast on an unreadable IR file before handing the path to the
        // reload worker, which only logs load failures rather than propagating them.
        load_ir(ir_path.as_ref(), host.sample_rate())
            .with_context(|| format!("failed to load impulse response '{ir_path}'"))?;
        reload.request_ir_reload(ir_path.into());
    }

    settings.block_size = host.block_size();
    settings.sample_rate = host.sample_rate();
    let _ = settings.save();

    let _active_client = host.activate().context("failed to activate JACK client")?;

    let running = Arc::new(AtomicBool::new(true));
    let shutdown_flag = Arc::clone(&running);

    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        shutdown_flag.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl+C handler")?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    Ok(())
}
