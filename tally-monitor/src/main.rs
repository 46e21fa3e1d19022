use anyhow::{Context, Result};
use tally::{Registry, SharedSummarizer, Signal, SummaryEvent, TallyConfig, lock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::command::Command;

mod command;

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing!()?;
    let env = shared::load_env_config!()?;
    let config = TallyConfig::load(&env.config_path)
        .with_context(|| format!("Failed to load {}", env.config_path.display()))?;

    let mut registry = Registry::new().with_options(config.summarizer_options());
    for name in &config.counters {
        registry.create(name);
        let summarizer = registry.trigger_summarizer(None, Some(name))?;
        log_summaries(name, &summarizer);
    }
    info!(counters = ?registry.names(), "monitor ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(command)) => match command.run(&mut registry) {
                        Ok(Some(summarizer)) => log_summaries(command.counter(), &summarizer),
                        Ok(None) => {}
                        Err(e) => warn!("{line}: {e:#}"),
                    },
                    Ok(None) => {}
                    Err(e) => warn!("{line}: {e:#}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    registry.destroy_all();
    Ok(())
}

fn log_summaries(counter: &str, summarizer: &SharedSummarizer) {
    let mut summarizer = lock(summarizer);
    let minute_counter = counter.to_owned();
    summarizer.on(Signal::MinuteSummary, move |event| {
        if let SummaryEvent::MinuteSummary(m) = event {
            debug!(counter = %minute_counter, hour = m.hour, minute = m.minute, peak = m.peak, avg = m.avg, "minute summary");
        }
        Ok(())
    });
    let hour_counter = counter.to_owned();
    summarizer.on(Signal::HourSummary, move |event| {
        if let SummaryEvent::HourSummary(h) = event {
            info!(counter = %hour_counter, hour = h.hour, peak = h.peak, avg = h.avg, "hour summary");
        }
        Ok(())
    });
}
