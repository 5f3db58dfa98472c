use clap::Parser;

#[tokio::main]
async fn main() {
    let args = auctioneer::arguments::Arguments::parse();
    observe::tracing::initialize(
        args.log_filter.as_str(),
        tracing::level_filters::LevelFilter::ERROR,
    );
    observe::metrics::setup_registry(Some("auctioneer".into()), None);
    tracing::info!("running auction engine with arguments:\n{}", args);
    auctioneer::run(args).await;
}
