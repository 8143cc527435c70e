//! this binary starts the kvd server
//! to see the list of options, type: `kvd-server --help`

use std::net::SocketAddr;
use std::process::exit;

use clap::{crate_version, App, Arg};
use kvd::{KvdError, KvdServer, MemStore, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and PORT
    /// returns `Ok<Opt>` if everything is valid
    /// # Errors
    /// returns [`KvdError::Parsing`] if the address is invalid
    ///
    fn build(addr: &str) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            KvdError::Parsing(format!(
                "could not parse {} into an IP address and port",
                &addr
            ))
        })?;
        Ok(Opt { addr })
    }
}

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    // parse command line args
    let matches = App::new("kvd-server")
        .version(crate_version!())
        .about("a single-threaded in-memory key-value server")
        .arg(
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP_ADDR:PORT")
                .help("sets the IP_ADDR:PORT that the server listens on")
                .default_value(DEFAULT_ADDRESS),
        )
        .get_matches();

    let addr = matches.value_of("addr").unwrap();
    let opt = match Opt::build(addr) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{:?}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(opt) {
        eprintln!("{:?}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("kvd-server {}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}", opt.addr);

    let server = KvdServer::bind(MemStore::new(), opt.addr)?;
    server.run()
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level higher than TRACE (e.g, debug, info, warn, etc.)
        // will be logged
        .with_max_level(Level::TRACE)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
