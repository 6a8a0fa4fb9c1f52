//! JACK realtime client wiring `StereoConvolutionManager` into an audio
//! graph. Grounded in `processor::Processor` for client/port setup and the
//! shape of `into_process_handler`, and in `audio::engine::{Engine,
//! EngineHandle}` for the control-plane channel pattern — except here the
//! channel only carries a *reload request* (a path to load), never the
//! installed IR itself; the actual swap always goes through
//! `ConvolutionManager::set_impulse_response` under its own try-lock, so the
//! realtime contract in `convolution::manager` is never bypassed. The output
//! gain stage (scale-then-clamp) is the one piece of the teacher's original
//! standalone gain-knob demo binary that survives here, folded into this
//! process closure instead of its own binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use jack::{AudioIn, AudioOut, Client, ClientOptions, Control, Port, ProcessScope};
use log::{error, info, warn};

use crate::convolution::StereoConvolutionManager;
use crate::host::wav::load_ir;

enum ReloadRequest {
    FromPath(PathBuf),
}

/// Non-realtime handle for requesting an IR reload; cheap to clone and send
/// across threads.
#[derive(Clone)]
pub struct ReloadHandle {
    sender: Sender<ReloadRequest>,
}

impl ReloadHandle {
    pub fn request_ir_reload(&self, path: PathBuf) {
        if self.sender.try_send(ReloadRequest::FromPath(path)).is_err() {
            warn!("reload request channel full; dropping request");
        }
    }
}

struct ReloadWorker {
    receiver: Receiver<ReloadRequest>,
    engine: Arc<StereoConvolutionManager<f32>>,
    sample_rate: u32,
}

impl ReloadWorker {
    fn run(self) {
        for request in self.receiver.iter() {
            match request {
                ReloadRequest::FromPath(path) => match load_ir(&path, self.sample_rate) {
                    Ok(ir) => {
                        if let Err(e) = self.engine.set_impulse_response(&ir, &ir) {
                            error!("failed to install impulse response from {path:?}: {e}");
                        } else {
                            info!("installed impulse response from {path:?}");
                        }
                    }
                    Err(e) => error!("failed to load impulse response from {path:?}: {e}"),
                },
            }
        }
    }
}

/// Owns the JACK client and the stereo convolution engine. `run` activates
/// the client and blocks the caller's thread only for setup; the realtime
/// callback itself runs on JACK's own thread.
pub struct JackHost {
    client: Client,
    in_port: Port<AudioIn>,
    out_l: Port<AudioOut>,
    out_r: Port<AudioOut>,
    engine: Arc<StereoConvolutionManager<f32>>,
    reload_receiver: Receiver<ReloadRequest>,
    gain: f32,
}

impl JackHost {
    /// `max_head_partitions` is the configured UPC partition count (see
    /// `crate::config::EngineSettings::max_head_partitions`); pass `None` to
    /// fall back to `DEFAULT_HEAD_PARTITIONS`. `gain` is applied to the
    /// convolved output just before it reaches the JACK output ports.
    pub fn new(
        ir: Option<&[f32]>,
        max_head_partitions: Option<usize>,
        gain: f32,
    ) -> Result<(Self, ReloadHandle)> {
        let (client, _status) =
            Client::new("rtconvolve", ClientOptions::NO_START_SERVER).context("failed to open JACK client")?;

        let block_size = client.buffer_size() as usize;

        let in_port = client
            .register_port("in", AudioIn::default())
            .context("failed to register input port")?;
        let out_l = client
            .register_port("out_l", AudioOut::default())
            .context("failed to register left output port")?;
        let out_r = client
            .register_port("out_r", AudioOut::default())
            .context("failed to register right output port")?;

        let _ = client.connect_ports_by_name("system:capture_1", "rtconvolve:in");
        let _ = client.connect_ports_by_name("rtconvolve:out_l", "system:playback_1");
        let _ = client.connect_ports_by_name("rtconvolve:out_r", "system:playback_2");

        let head_partitions = max_head_partitions.unwrap_or(crate::convolution::DEFAULT_HEAD_PARTITIONS);
        let engine = Arc::new(
            StereoConvolutionManager::<f32>::with_head_partitions(ir, ir, Some(block_size), head_partitions)
                .map_err(anyhow::Error::from)?,
        );

        let (reload_sender, reload_receiver) = bounded(4);

        Ok((
            Self {
                client,
                in_port,
                out_l,
                out_r,
                engine,
                reload_receiver,
                gain,
            },
            ReloadHandle {
                sender: reload_sender,
            },
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.client.sample_rate() as u32
    }

    pub fn block_size(&self) -> usize {
        self.client.buffer_size() as usize
    }

    /// Spawns the reload worker and activates the JACK client. Returns the
    /// active client handle (kept alive by the caller) and the join handle
    /// for the reload worker thread.
    pub fn activate(self) -> Result<jack::AsyncClient<Notifications, impl jack::ProcessHandler>> {
        let worker = ReloadWorker {
            receiver: self.reload_receiver,
            engine: Arc::clone(&self.engine),
            sample_rate: self.sample_rate(),
        };
        std::thread::spawn(move || worker.run());

        let engine = self.engine;
        let in_port = self.in_port;
        let mut out_l = self.out_l;
        let mut out_r = self.out_r;
        let gain = self.gain;
        let mut output_left = vec![0.0f32; self.client.buffer_size() as usize];
        let mut output_right = vec![0.0f32; self.client.buffer_size() as usize];

        let process = move |_client: &Client, ps: &ProcessScope| -> Control {
            let input = in_port.as_slice(ps);
            let out_buf_l = out_l.as_mut_slice(ps);
            let out_buf_r = out_r.as_mut_slice(ps);

            engine.process_input(input, input, &mut output_left, &mut output_right);
            for (dst, &src) in out_buf_l.iter_mut().zip(output_left.iter()) {
                *dst = (src * gain).clamp(-1.0, 1.0);
            }
            for (dst, &src) in out_buf_r.iter_mut().zip(output_right.iter()) {
                *dst = (src * gain).clamp(-1.0, 1.0);
            }

            Control::Continue
        };

        self.client
            .activate_async(Notifications, jack::ClosureProcessHandler::new(process))
            .context("failed to activate JACK client")
    }
}

pub struct Notifications;

impl jack::NotificationHandler for Notifications {
    fn shutdown(&mut self, _status: jack::ClientStatus, reason: &str) {
        warn!("JACK server shut down the client: {reason}");
    }
}
