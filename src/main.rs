#[macro_use]
extern crate log;

use std::env;
use std::process;
use std::time::Duration;

use async_xmlrpc::{Client, ClientConfig, Value};
use clap::{crate_version, value_parser, Arg, ArgAction, Command};

/// Types a command line argument by its literal form.
fn parse_param(arg: &str) -> Value {
    if let Ok(n) = arg.parse::<i64>() {
        return Value::Int(n);
    }
    match arg.parse::<f64>() {
        Ok(n) if n.is_finite() => return Value::Double(n),
        _ => {}
    }
    match arg {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "nil" => Value::Nil,
        _ => Value::String(arg.to_string()),
    }
}

fn main() {
    let matches = Command::new("xrc")
        .version(crate_version!())
        .author("Damien Lecan <dev@dlecan.com>")
        .about("Calls a method on an XML-RPC server and prints the result")
        .arg(Arg::new("timeout")
            .short('t')
            .long("timeout")
            .value_name("SECS")
            .value_parser(value_parser!(u64))
            .default_value("60")
            .help("Give up on the call after this many seconds"))
        .arg(Arg::new("allow-none")
            .long("allow-none")
            .action(ArgAction::SetTrue)
            .help("Allow 'nil' arguments to be sent"))
        .arg(Arg::new("verbose")
            .short('v')
            .action(ArgAction::Count)
            .help("Verbose mode, twice to dump request and response bodies"))
        .arg(Arg::new("uri")
            .required(true)
            .help("Server endpoint, e.g. \"http://localhost:8000/RPC2\""))
        .arg(Arg::new("method")
            .required(true)
            .help("Method name, e.g. \"system.listMethods\""))
        .arg(Arg::new("params")
            .num_args(0..)
            .help("Positional arguments: integers, doubles, true/false, nil, anything else is a string"))
        .get_matches();

    // Init logging to DEBUG only if user required it
    match matches.get_count("verbose") {
        0 => {}
        1 => env::set_var("RUST_LOG", "DEBUG"),
        _ => env::set_var("RUST_LOG", "TRACE"),
    }
    env_logger::init();

    let uri = matches.get_one::<String>("uri").map(String::as_str).unwrap_or_default();
    let method = matches.get_one::<String>("method").map(String::as_str).unwrap_or_default();
    let params: Vec<Value> = matches
        .get_many::<String>("params")
        .map(|values| values.map(|v| parse_param(v)).collect())
        .unwrap_or_default();
    debug!("Calling {} on {} with {:?}", method, uri, params);

    let config = ClientConfig::default()
        .timeout(Duration::from_secs(*matches.get_one::<u64>("timeout").unwrap_or(&60)))
        .allow_none(matches.get_flag("allow-none"));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("xrc: cannot start runtime: {}", err);
            process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let client = Client::with_config(uri, config)?;
        client.call(method, params).await
    });

    match result {
        Ok(value) => println!("{}", value),
        Err(err) => {
            eprintln!("xrc: {}", err);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_param;
    use async_xmlrpc::Value;

    #[test]
    fn test_parse_param() {
        assert_eq!(Value::Int(42), parse_param("42"));
        assert_eq!(Value::Int(-1), parse_param("-1"));
        assert_eq!(Value::Double(4.2), parse_param("4.2"));
        assert_eq!(Value::Boolean(true), parse_param("true"));
        assert_eq!(Value::Nil, parse_param("nil"));
        assert_eq!(Value::from("domain.com"), parse_param("domain.com"));
        assert_eq!(Value::from("inf"), parse_param("inf"));
    }
}
