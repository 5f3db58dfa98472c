use std::time::Duration;
use url::Url;

#[derive(clap::Parser)]
pub struct Arguments {
    /// Filter for the tracing subscriber, env_logger syntax.
    #[clap(long, env, default_value = "warn,auctioneer=debug")]
    pub log_filter: String,

    /// Url of the Postgres database. By default connects to locally
    /// running postgres.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: Url,

    /// Interval of the periodic "time remaining" tick every active
    /// auction's countdown republishes.
    #[clap(
        long,
        env,
        default_value = "5s",
        value_parser = humantime::parse_duration,
    )]
    pub countdown_tick: Duration,

    /// How often a bid placement that lost a concurrent commit race is
    /// attempted before the conflict is surfaced to the caller.
    #[clap(long, env, default_value = "3")]
    pub max_placement_attempts: usize,

    /// Capacity of the domain event broadcast channel. Slow subscribers
    /// miss events once they lag behind by more than this.
    #[clap(long, env, default_value = "1024")]
    pub event_channel_capacity: usize,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "db_url: {}", self.db_url)?;
        writeln!(f, "countdown_tick: {:?}", self.countdown_tick)?;
        writeln!(f, "max_placement_attempts: {}", self.max_placement_attempts)?;
        writeln!(
            f,
            "event_channel_capacity: {}",
            self.event_channel_capacity
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_parse() {
        let args = Arguments::parse_from(["auctioneer"]);
        assert_eq!(args.countdown_tick, Duration::from_secs(5));
        assert_eq!(args.max_placement_attempts, 3);
    }
}
