//! Line commands read from stdin.

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use tally::{DEFAULT_COUNTER, HourRollup, Registry, SharedSummarizer};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(String),
    Delete(String),
    Add { counter: Option<String>, delta: i64 },
    Value(Option<String>),
    Peak(Option<String>),
    Average(Option<String>),
    Pause(Option<String>),
    Resume(Option<String>),
    Summarize(Option<String>),
    Hours(Option<String>),
}

impl Command {
    /// Parses one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        if verb.starts_with('#') {
            return Ok(None);
        }
        let args: Vec<&str> = words.collect();
        let counter = || args.first().map(|s| (*s).to_owned());

        let command = match verb {
            "create" => Command::Create(required(&args)?),
            "delete" => Command::Delete(required(&args)?),
            "inc" | "dec" => {
                let (counter, delta) = counter_and_delta(&args)?;
                let delta = if verb == "dec" { -delta } else { delta };
                Command::Add { counter, delta }
            }
            "value" => Command::Value(counter()),
            "peak" => Command::Peak(counter()),
            "avg" => Command::Average(counter()),
            "pause" => Command::Pause(counter()),
            "resume" => Command::Resume(counter()),
            "summarize" => Command::Summarize(counter()),
            "hours" => Command::Hours(counter()),
            other => bail!("unknown command {other:?}"),
        };
        Ok(Some(command))
    }

    pub fn counter(&self) -> &str {
        let name = match self {
            Command::Create(name) | Command::Delete(name) => Some(name),
            Command::Add { counter, .. }
            | Command::Value(counter)
            | Command::Peak(counter)
            | Command::Average(counter)
            | Command::Pause(counter)
            | Command::Resume(counter)
            | Command::Summarize(counter)
            | Command::Hours(counter) => counter.as_ref(),
        };
        name.map_or(DEFAULT_COUNTER, String::as_str)
    }

    /// Runs the command, printing its answer. Returns the summarizer if one was just started.
    pub fn run(&self, registry: &mut Registry) -> Result<Option<SharedSummarizer>> {
        let name = Some(self.counter());
        match self {
            Command::Create(name) => {
                registry.create(name);
            }
            Command::Delete(name) => registry.delete(name)?,
            Command::Add { delta, .. } => {
                if !registry.add(*delta, name)? {
                    println!("{} is paused", self.counter());
                }
            }
            Command::Value(_) => println!("{}", registry.last_value(name)?),
            Command::Peak(_) => println!("{}", registry.peak(None, None, name)?),
            Command::Average(_) => println!("{:.3}", registry.average(None, None, name)?),
            Command::Pause(_) => registry.pause(name)?,
            Command::Resume(_) => registry.resume(name)?,
            Command::Summarize(_) => {
                if registry.summarizer(name).is_err() {
                    return Ok(Some(registry.trigger_summarizer(None, name)?));
                }
            }
            Command::Hours(_) => {
                for line in hour_lines(&registry.hour_rollups(name)?)? {
                    println!("{line}");
                }
            }
        }
        Ok(None)
    }
}

/// One line per hour, labelled with the hour's RFC 3339 start.
fn hour_lines(rollups: &[HourRollup]) -> Result<Vec<String>> {
    rollups
        .iter()
        .map(|rollup| {
            let hour = DateTime::from_timestamp_millis(rollup.hour).context("hour out of range")?;
            Ok(format!(
                "{} peak={} avg={:.3}",
                hour.to_rfc3339(),
                rollup.peak,
                rollup.avg
            ))
        })
        .collect()
}

fn required(args: &[&str]) -> Result<String> {
    args.first()
        .map(|s| (*s).to_owned())
        .context("missing counter name")
}

/// `[counter] [delta]`, where a lone numeric argument is the delta.
fn counter_and_delta(args: &[&str]) -> Result<(Option<String>, i64)> {
    match args {
        [] => Ok((None, 1)),
        [only] => match only.parse::<i64>() {
            Ok(delta) => Ok((None, delta)),
            Err(_) => Ok((Some((*only).to_owned()), 1)),
        },
        [counter, delta, ..] => {
            let delta = delta
                .parse::<i64>()
                .with_context(|| format!("invalid delta {delta:?}"))?;
            Ok((Some((*counter).to_owned()), delta))
        }
    }
}
