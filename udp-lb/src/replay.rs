use crate::{backends, config::ConfigFile, helpers, stats};
use anyhow::Context;
use clap::Args;
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{signal, task::JoinSet};
use udp_lb_common::Action;
use udp_lb_datapath::{DestinationTable, Dispatcher};

#[derive(Debug, Args)]
pub struct ReplayOpt {
    /// Load balancer config file
    #[clap(short, long)]
    pub config: String,

    /// File with one hex encoded Ethernet frame per line, `#` starts a comment
    pub frames: String,

    /// Number of concurrent dispatch workers
    #[clap(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Write every frame as it leaves the dispatcher to this file
    #[clap(short, long)]
    pub out: Option<String>,
}

#[derive(Debug)]
pub struct Frame {
    pub line: usize,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct Outcome {
    pub line: usize,
    pub action: Action,
    pub data: Vec<u8>,
}

pub fn parse_frames(contents: &str) -> Result<Vec<Frame>, anyhow::Error> {
    let mut frames = vec![];

    for (i, line) in contents.lines().enumerate() {
        let text = line.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let data =
            helpers::parse_hex_frame(text).context(format!("Invalid frame at line {}", i + 1))?;
        frames.push(Frame { line: i + 1, data });
    }

    Ok(frames)
}

fn action_to_string(action: &Action) -> String {
    match action {
        Action::Redirect(ifindex) => format!("{} if#{}", action.as_str(), ifindex),
        _ => action.as_str().to_string(),
    }
}

pub fn format_outcomes(outcomes: &[Outcome]) -> String {
    outcomes
        .iter()
        .map(|o| {
            format!(
                "# line {}: {}\n{}\n",
                o.line,
                action_to_string(&o.action),
                helpers::frame_to_hex(&o.data)
            )
        })
        .collect()
}

/// Splits the frames in batches and runs each batch on the blocking pool.
/// Workers check `stop` before every frame. Outcomes are returned in the
/// input order.
pub async fn dispatch(
    lb: Arc<Dispatcher>,
    frames: Vec<Frame>,
    workers: usize,
    stop: Arc<AtomicBool>,
) -> Result<Vec<Outcome>, anyhow::Error> {
    let batch_size = frames.len().div_ceil(workers.max(1)).max(1);
    let mut frames = frames.into_iter();
    let mut tasks = JoinSet::new();

    loop {
        let batch = frames.by_ref().take(batch_size).collect::<Vec<_>>();
        if batch.is_empty() {
            break;
        }

        let lb = lb.clone();
        let stop = stop.clone();
        tasks.spawn_blocking(move || {
            batch
                .into_iter()
                .take_while(|_| !stop.load(Ordering::Relaxed))
                .map(|mut frame| {
                    let action = lb.process(&mut frame.data);
                    Outcome {
                        line: frame.line,
                        action,
                        data: frame.data,
                    }
                })
                .collect::<Vec<_>>()
        });
    }

    let mut outcomes = vec![];
    while let Some(res) = tasks.join_next().await {
        outcomes.extend(res.context("Dispatch worker failed")?);
    }
    outcomes.sort_by_key(|o| o.line);

    Ok(outcomes)
}

pub async fn run(opt: &ReplayOpt) -> Result<(), anyhow::Error> {
    let cfg = ConfigFile::new(&opt.config).load()?;
    let backends = cfg.backends()?;
    let (ctl, reader) = DestinationTable::create();
    backends::provision(&ctl, &cfg, &backends)?;

    let contents = tokio::fs::read_to_string(&opt.frames)
        .await
        .context(format!("Can't read frames file: {}", opt.frames))?;
    let frames = parse_frames(&contents)?;
    let total = frames.len();
    info!("Loaded {} frames from: {}", total, opt.frames);

    let lb = Arc::new(Dispatcher::new(reader).with_service_port(cfg.service_port));
    let stop = Arc::new(AtomicBool::new(false));
    let mut task = tokio::spawn(dispatch(lb.clone(), frames, opt.workers, stop.clone()));

    let outcomes = tokio::select! {
        res = &mut task => res??,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, stopping dispatch ...");
            stop.store(true, Ordering::Relaxed);
            task.await??
        }
    };

    if outcomes.len() < total {
        warn!("Dispatched {} of {} frames", outcomes.len(), total);
    } else {
        info!("Dispatched {} frames on {} workers", total, opt.workers);
    }

    if let Some(path) = &opt.out {
        let contents = format_outcomes(&outcomes);
        tokio::fs::write(path, &contents)
            .await
            .context(format!("Can't write to output file: {}", path))?;
        info!("Wrote {} bytes to: {}", contents.len(), path);
    }

    stats::print_counters(lb.counters());
    stats::print_backends(&ctl.snapshot());

    ctl.teardown();

    Ok(())
}
