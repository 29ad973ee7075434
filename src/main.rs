mod config;
mod ethereum;

use alloy::json_abi::{Event, StateMutability};
use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::str::FromStr;
use tracing::info;

use config::Config;
use ethereum::{
    coerce,
    dispatch::Dispatcher,
    display_name, filter,
    provider::{HttpRpc, LocalWallet},
    registry::AbiRegistry,
    CallOutcome, CallRequest, ParamValues,
};

fn cli() -> Command {
    Command::new("contract-console")
        .version("0.1.0")
        .about("Inspect smart-contract ABIs and invoke their functions against an Ethereum node")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file")
                .global(true),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .help("Named network from the configuration")
                .global(true),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("inspect")
                .about("List the callable functions and event types of an ABI document")
                .arg(abi_arg()),
        )
        .subcommand(
            Command::new("call")
                .about("Invoke a function; reads print the decoded value, writes need `send`")
                .arg(abi_arg())
                .arg(address_arg())
                .arg(function_arg())
                .arg(value_args()),
        )
        .subcommand(
            Command::new("send")
                .about("Invoke a state-changing function, await the receipt and decode its events")
                .arg(abi_arg())
                .arg(address_arg())
                .arg(function_arg())
                .arg(value_args())
                .arg(
                    Arg::new("private-key")
                        .long("private-key")
                        .value_name("HEX")
                        .help("Signing key; falls back to the PRIVATE_KEY environment variable"),
                ),
        )
        .subcommand(
            Command::new("events")
                .about("Query historical logs for one event type and decode them")
                .arg(abi_arg())
                .arg(address_arg())
                .arg(
                    Arg::new("event")
                        .long("event")
                        .value_name("NAME")
                        .required(true)
                        .help("Event name from the ABI"),
                )
                .arg(
                    Arg::new("filter")
                        .long("filter")
                        .value_name("NAME=VALUE")
                        .action(ArgAction::Append)
                        .help("Equality filter on an indexed parameter; repeatable"),
                )
                .arg(
                    Arg::new("from-block")
                        .long("from-block")
                        .value_name("NUMBER")
                        .help("Lower block bound (absent = node default)"),
                )
                .arg(
                    Arg::new("to-block")
                        .long("to-block")
                        .value_name("NUMBER")
                        .help("Upper block bound (absent = node default)"),
                ),
        )
}

fn abi_arg() -> Arg {
    Arg::new("abi")
        .long("abi")
        .value_name("FILE")
        .required(true)
        .help("Path to the ABI JSON document (bare array or {\"abi\": [...]})")
}

fn address_arg() -> Arg {
    Arg::new("address")
        .long("address")
        .value_name("ADDRESS")
        .required(true)
        .help("Contract address (0x-prefixed)")
}

fn function_arg() -> Arg {
    Arg::new("function")
        .long("function")
        .value_name("NAME")
        .required(true)
        .help("Function name, or full signature like transfer(address,uint256) for overloads")
}

fn value_args() -> Arg {
    Arg::new("arg")
        .long("arg")
        .value_name("VALUE")
        .action(ArgAction::Append)
        .help("Raw argument value in declaration order; repeatable")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Log to stderr so stdout stays clean machine-readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = cli().get_matches();

    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        println!("{}", Config::default_config_path()?.display());
        return Ok(());
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_or_default(Some(path.as_str())).await,
        None => match Config::default_config_path() {
            Ok(path) if path.exists() => Config::load_or_default(Some(path)).await,
            _ => Config::load_or_default(None::<&str>).await,
        },
    };
    let network = matches.get_one::<String>("network").map(|s| s.as_str());

    match matches.subcommand() {
        Some(("inspect", sub)) => inspect(sub).await,
        Some(("call", sub)) => invoke(&config, network, sub, None).await,
        Some(("send", sub)) => {
            let key = sub
                .get_one::<String>("private-key")
                .cloned()
                .or_else(|| std::env::var("PRIVATE_KEY").ok())
                .ok_or_else(|| {
                    anyhow!("send requires --private-key or the PRIVATE_KEY environment variable")
                })?;
            invoke(&config, network, sub, Some(key)).await
        }
        Some(("events", sub)) => events(&config, network, sub).await,
        _ => {
            cli().print_long_help()?;
            Ok(())
        }
    }
}

async fn load_registry(path: &str) -> Result<AbiRegistry> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read ABI file '{path}'"))?;
    AbiRegistry::parse(&raw).map_err(|e| anyhow!("unusable ABI in '{path}': {e}"))
}

fn mutability_label(mutability: StateMutability) -> &'static str {
    match mutability {
        StateMutability::Pure => "pure",
        StateMutability::View => "view",
        StateMutability::NonPayable => "nonpayable",
        StateMutability::Payable => "payable",
    }
}

async fn inspect(sub: &ArgMatches) -> Result<()> {
    let registry = load_registry(sub.get_one::<String>("abi").unwrap()).await?;

    println!("Functions ({}):", registry.functions().len());
    for function in registry.functions() {
        let outputs: Vec<String> = function.outputs.iter().map(|o| o.ty.clone()).collect();
        let returns = if outputs.is_empty() {
            String::new()
        } else {
            format!(" -> ({})", outputs.join(", "))
        };
        println!(
            "  {} [{}]{}",
            function.signature(),
            mutability_label(function.state_mutability),
            returns
        );
    }

    println!("Events ({}):", registry.events().len());
    for event in registry.events() {
        let inputs: Vec<String> = event
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let marker = if input.indexed { " indexed" } else { "" };
                format!("{}{} {}", input.ty, marker, display_name(&input.name, i))
            })
            .collect();
        println!("  {}({})", event.name, inputs.join(", "));
    }

    Ok(())
}

async fn invoke(
    config: &Config,
    network: Option<&str>,
    sub: &ArgMatches,
    private_key: Option<String>,
) -> Result<()> {
    let registry = load_registry(sub.get_one::<String>("abi").unwrap()).await?;
    let address = parse_address(sub.get_one::<String>("address").unwrap())?;
    let selector = sub.get_one::<String>("function").unwrap();

    let function = registry.find_function(selector).ok_or_else(|| {
        let available: Vec<String> = registry.functions().iter().map(|f| f.signature()).collect();
        if available.is_empty() {
            anyhow!("function '{selector}' not found: the ABI contains no functions")
        } else {
            anyhow!(
                "function '{selector}' not found or ambiguous. Available: {}",
                available.join(", ")
            )
        }
    })?;

    let raw_args: Vec<String> = sub
        .get_many::<String>("arg")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let values = ParamValues::from_ordered(raw_args);
    let args = coerce::coerce_all(&function.inputs, &values)?;

    let request = CallRequest {
        to: address,
        function: function.clone(),
        args,
        from: None,
    };

    let net = config.network(network)?;
    let rpc = HttpRpc::connect(&net.rpc_url)?;
    let wallet = private_key
        .map(|key| LocalWallet::from_private_key(&key, &net.rpc_url))
        .transpose()?;
    let dispatcher = Dispatcher::new(
        rpc,
        wallet,
        config.receipt.timeout(),
        config.receipt.poll_interval(),
    );

    let outcome = dispatcher.dispatch(&request).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let CallOutcome::TxSubmitted { hash } = outcome {
        info!("awaiting receipt for 0x{:x}", hash);
        let confirmed = dispatcher.confirm(&registry, hash).await;
        println!("{}", serde_json::to_string_pretty(&confirmed)?);
    }

    Ok(())
}

async fn events(config: &Config, network: Option<&str>, sub: &ArgMatches) -> Result<()> {
    let registry = load_registry(sub.get_one::<String>("abi").unwrap()).await?;
    let address = parse_address(sub.get_one::<String>("address").unwrap())?;
    let name = sub.get_one::<String>("event").unwrap();

    let event = registry.find_event(name).ok_or_else(|| {
        let available: Vec<String> = registry.events().iter().map(|e| e.name.clone()).collect();
        anyhow!(
            "event '{name}' not found in the ABI. Available: {}",
            available.join(", ")
        )
    })?;

    let mut values = ParamValues::new();
    if let Some(pairs) = sub.get_many::<String>("filter") {
        for pair in pairs {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("filter '{pair}' must look like name=value"))?;
            let index = resolve_event_param(event, key)?;
            values.set(index, value);
        }
    }

    let from_block = parse_block(sub.get_one::<String>("from-block"))?;
    let to_block = parse_block(sub.get_one::<String>("to-block"))?;
    let log_filter = filter::build_filter(address, event, &values, from_block, to_block)?;

    let net = config.network(network)?;
    let rpc = HttpRpc::connect(&net.rpc_url)?;
    let dispatcher: Dispatcher<HttpRpc, LocalWallet> = Dispatcher::new(
        rpc,
        None,
        config.receipt.timeout(),
        config.receipt.poll_interval(),
    );

    let decoded = dispatcher
        .query_events(&registry, &log_filter)
        .await
        .map_err(|e| anyhow!("log query failed: {e}"))?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);

    Ok(())
}

fn resolve_event_param(event: &Event, key: &str) -> Result<usize> {
    event
        .inputs
        .iter()
        .enumerate()
        .find(|(i, input)| display_name(&input.name, *i) == key)
        .map(|(i, _)| i)
        .ok_or_else(|| {
            let names: Vec<String> = event
                .inputs
                .iter()
                .enumerate()
                .map(|(i, input)| display_name(&input.name, i))
                .collect();
            anyhow!(
                "event '{}' has no parameter '{}'. Parameters: {}",
                event.name,
                key,
                names.join(", ")
            )
        })
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| anyhow!("invalid contract address '{}': {}", raw, e))
}

fn parse_block(raw: Option<&String>) -> Result<Option<u64>> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("invalid block number '{raw}'")),
    }
}
