use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use spotcheck::{
    CheckOptions, Config, FixedPeerId, HttpRoundSource, IpniClient, Measurement, PeerIdResolver,
    RetrievalCandidate, RetrievalTask, RpcPeerIdResolver, SpotChecker, Tasker,
};
use spotcheck_fetch::{CarFetcher, DagScope, EntityBytesRange, Protocol, ReqwestClient, build_url};

const LASSIE_INSTALL: &str =
    "How to install Lassie: https://github.com/filecoin-project/lassie?tab=readme-ov-file#installation";

#[derive(Debug, Parser)]
#[command(name = "spotcheck", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// TOML configuration file.
    #[arg(long, short, global = true)]
    pub config:    Option<PathBuf>,
    /// Log filter directive, e.g. `debug` or `spotcheck_fetch=trace`. Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub cmd:       Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "r", name = "run", about = "Check the retrieval tasks of a round")]
    Run(RunArg),
    #[command(alias = "c", name = "check", about = "Check one CID against one storage provider")]
    Check(CheckArg),
}

/// Overrides for the shape of the full retrieval.
#[derive(Debug, Clone, Default, Args)]
pub struct ScopeArg {
    #[arg(long)]
    pub dag_scope:       Option<DagScope>,
    /// `<start>:<end|*>`, used with the `entity` scope.
    #[arg(long)]
    pub entity_bytes:    Option<EntityBytesRange>,
    /// Stop reading a full retrieval once more than this many bytes arrived.
    #[arg(long)]
    pub max_byte_length: Option<u64>,
}

impl ScopeArg {
    fn apply(&self, config: &mut Config) {
        if let Some(dag_scope) = self.dag_scope {
            config.dag_scope = dag_scope;
        }
        if let Some(range) = self.entity_bytes {
            config.entity_bytes_range = range;
        }
        if self.max_byte_length.is_some() {
            config.max_byte_length = self.max_byte_length;
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunArg {
    /// Round to check; non-positive selects the current round.
    #[arg(long, allow_negative_numbers = true)]
    pub round_id:  Option<i64>,
    /// Check at most this many tasks; non-positive means all.
    #[arg(long, allow_negative_numbers = true)]
    pub max_tasks: Option<i64>,
    /// Only check this miner's tasks.
    #[arg(long)]
    pub miner_id:  Option<String>,
    #[command(flatten)]
    pub scope:     ScopeArg,
    /// Write the JSON results here instead of stdout.
    #[arg(long, short)]
    pub output:    Option<PathBuf>,
}

impl RunArg {
    fn apply(&self, config: &mut Config) {
        if self.round_id.is_some() {
            config.round_id = self.round_id;
        }
        if self.max_tasks.is_some() {
            config.max_tasks = self.max_tasks;
        }
        if self.miner_id.is_some() {
            config.miner_id = self.miner_id.clone();
        }
        self.scope.apply(config);
    }

    async fn execute(self, mut config: Config) -> anyhow::Result<()> {
        self.apply(&mut config);
        config.validate()?;
        let client = http_client(&config)?;

        let tasks = if config.retrieval_tasks.is_empty() {
            let source = HttpRoundSource::new(
                client.clone(),
                config.endpoints.rounds_api.clone(),
                config.endpoints.meridian_contract.clone(),
            )
            .timeout(config.round_timeout());
            Tasker::new(source)
                .get_tasks(&config.task_query())
                .await
                .context("cannot obtain retrieval tasks")?
        } else {
            tracing::info!(tasks = config.retrieval_tasks.len(), "using configured retrieval tasks");
            config.retrieval_tasks.clone()
        };

        let checker = spot_checker(rpc_resolver(client.clone(), &config), client, &config);
        let outcomes = checker.run(tasks).await;
        let json = serde_json::to_string_pretty(&outcomes)?;

        match &self.output {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("cannot write results to {}", path.display()))?,
            None => println!("{json}"),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct CheckArg {
    #[arg(long)]
    pub cid:      String,
    #[arg(long)]
    pub miner_id: String,
    /// Known peer id of the miner; skips the RPC lookup.
    #[arg(long)]
    pub peer_id:  Option<String>,
    #[command(flatten)]
    pub scope:    ScopeArg,
}

impl CheckArg {
    async fn execute(self, mut config: Config) -> anyhow::Result<()> {
        self.scope.apply(&mut config);
        config.validate()?;
        let client = http_client(&config)?;
        let task = RetrievalTask::new(self.cid, self.miner_id);

        let measurement = match self.peer_id {
            Some(peer_id) => spot_checker(FixedPeerId(peer_id), client, &config).check(&task).await?,
            None => {
                spot_checker(rpc_resolver(client.clone(), &config), client, &config)
                    .check(&task)
                    .await?
            }
        };

        println!("Measurement: {}", serde_json::to_string_pretty(&measurement)?);
        let hints = troubleshooting_hints(&task, &measurement, &config.check_options());
        if !hints.is_empty() {
            println!();
            for line in hints {
                println!("{line}");
            }
        }
        Ok(())
    }
}

impl App {
    pub async fn execute(self) -> anyhow::Result<()> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        match self.cmd {
            Commands::Run(arg) => arg.execute(config).await,
            Commands::Check(arg) => arg.execute(config).await,
        }
    }
}

fn http_client(config: &Config) -> anyhow::Result<ReqwestClient> {
    let client = ReqwestClient::new().context("cannot build HTTP client")?;
    Ok(match &config.endpoints.ipfs_gateway {
        Some(gateway) => client.ipfs_gateway(gateway.clone()),
        None => client,
    })
}

fn rpc_resolver(client: ReqwestClient, config: &Config) -> RpcPeerIdResolver<ReqwestClient> {
    let resolver = RpcPeerIdResolver::new(client, config.endpoints.rpc.clone()).backoff(config.backoff());
    match &config.endpoints.rpc_auth {
        Some(token) => resolver.auth(token.clone()),
        None => resolver,
    }
}

fn spot_checker<R: PeerIdResolver>(
    resolver: R,
    client: ReqwestClient,
    config: &Config,
) -> SpotChecker<R, IpniClient<ReqwestClient>, ReqwestClient> {
    SpotChecker::new(
        resolver,
        IpniClient::new(client.clone(), config.endpoints.ipni.clone()),
        CarFetcher::new(client),
        config.check_options(),
    )
}

/// Commands a provider operator can run to reproduce a failed retrieval.
fn troubleshooting_hints(task: &RetrievalTask, measurement: &Measurement, options: &CheckOptions) -> Vec<String> {
    let (Some(protocol), Some(address)) = (measurement.protocol, measurement.provider_address.as_deref()) else {
        return Vec::new();
    };
    if measurement.block_retrieval.is_success() && measurement.full_retrieval.is_success() {
        return Vec::new();
    }

    let lassie = format!(
        "  lassie fetch -o /dev/null -vv --dag-scope block --protocols {protocol} --providers {address:?} {}",
        task.cid
    );
    let mut hints = vec!["The retrieval failed.".to_string()];

    match protocol {
        Protocol::Http => {
            let candidate = RetrievalCandidate {
                protocol,
                address: address.to_string(),
            };
            match build_url(&options.full_request(task, &candidate)) {
                Ok(url) => hints.extend([
                    "You can get more details by requesting the following URL yourself:".to_string(),
                    format!("  {url}"),
                    "E.g. using `curl`:".to_string(),
                    format!("  curl -i {url:?}"),
                    "You can also test the retrieval using Lassie:".to_string(),
                    lassie,
                    LASSIE_INSTALL.to_string(),
                ]),
                Err(err) => hints.push(format!(
                    "The provider address {address:?} cannot be converted to a URL: {err}"
                )),
            }
        }
        Protocol::Graphsync | Protocol::Bitswap => hints.extend([
            "You can get more details by running Lassie manually:".to_string(),
            lassie,
            LASSIE_INSTALL.to_string(),
        ]),
    }
    hints
}
