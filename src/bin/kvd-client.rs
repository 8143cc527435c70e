//! The kvd-client executable supports the following command line arguments:
//!
//! `kvd-client set <KEY> <VALUE> [--addr IP-PORT]`
//!
//!     Set the value of a string key to a string.
//!
//! `kvd-client get <KEY> [--addr IP-PORT]`
//!
//!     Get the string value of a given string key.
//!
//! `kvd-client del <KEY> [--addr IP-PORT]`
//!
//!     Remove a given key. Removing a key that does not exist is not an error.
//!
//! `--addr` accepts an IP address, either v4 or v6, and a port number, with
//! the format IP:PORT. If `--addr` is not specified then connect on
//! 127.0.0.1:8080.

use std::net::SocketAddr;
use std::process::exit;

use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use kvd::{KvdClient, KvdError, Request, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    req: Request,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and PORT
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`KvdError::Parsing`] if the address is invalid
    ///
    fn build(addr: &str, req: Request) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            KvdError::Parsing(format!(
                "could not parse {} into an IP address and port",
                &addr
            ))
        })?;
        Ok(Opt { addr, req })
    }
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("kvd-client")
        .version(crate_version!())
        .about("client for the kvd key-value server")
        .subcommands(vec![
            SubCommand::with_name("set")
                .about("Set the value of a string key to a string")
                .arg(Arg::with_name("KEY").required(true).index(1))
                .arg(Arg::with_name("VALUE").required(true).index(2)),
            SubCommand::with_name("get")
                .about("Get the string value of a given string key")
                .arg(Arg::with_name("KEY").required(true).index(1)),
            SubCommand::with_name("del")
                .about("Removes a given key")
                .arg(Arg::with_name("KEY").required(true).index(1)),
        ])
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help("sets the IP_ADDR:PORT of the server to connect to")
                .default_value(DEFAULT_ADDRESS),
        )
        .get_matches();

    // parse commands into an Opt struct, then run the request
    let result = match parse_options(matches) {
        Ok(opt) => run(opt),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("{:?}", e);
        exit(1);
    }
}

/// runs the specified request on the [`KvdClient`]
/// `opt` contains the server address and the request type to execute
fn run(opt: Opt) -> Result<()> {
    let mut client = KvdClient::connect(opt.addr)?;
    match opt.req {
        Request::Get { key } => {
            if let Some(value) = client.get(&key)? {
                println!("{}", String::from_utf8_lossy(&value));
            } else {
                println!("Key not found");
            }
        }
        Request::Set { key, value } => {
            client.set(&key, &value)?;
        }
        Request::Del { key } => {
            client.del(&key)?;
        }
    }
    Ok(())
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap();
    match matches.subcommand() {
        ("set", Some(args)) => {
            let key = args.value_of("KEY").unwrap().as_bytes().to_vec();
            let value = args.value_of("VALUE").unwrap().as_bytes().to_vec();
            Opt::build(addr, Request::Set { key, value })
        }
        ("get", Some(args)) => {
            let key = args.value_of("KEY").unwrap().as_bytes().to_vec();
            Opt::build(addr, Request::Get { key })
        }
        ("del", Some(args)) => {
            let key = args.value_of("KEY").unwrap().as_bytes().to_vec();
            Opt::build(addr, Request::Del { key })
        }
        _ => Err(KvdError::Parsing(
            "expected one of the subcommands: get, set, del".to_string(),
        )),
    }
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // client logging is quiet unless something goes wrong
        .with_max_level(Level::WARN)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
