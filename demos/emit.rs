//! Emit - send a few events to a running receiver.
//!
//! This demo:
//! - Connects to the receiver socket
//! - Sends a container start
//! - Sends an open and a read, each as an entry and an exit event
//!
//! # Running
//!
//! ```text
//! cargo run --bin seccheck-server -- /tmp/123.sock
//! cargo run --example emit -- /tmp/123.sock
//! ```

use std::path::PathBuf;

use seccheck_receiver::points::{Exit, Open, Read, Start};
use seccheck_receiver::{Remote, DEFAULT_SOCKET_PATH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));

    let mut remote = Remote::connect(&path).await?;

    remote
        .write(&Start {
            id: "demo".to_string(),
            cwd: "/".to_string(),
            args: vec!["/bin/cat".to_string(), "/etc/hostname".to_string()],
            env: vec!["PATH=/usr/bin:/bin".to_string()],
            terminal: false,
        })
        .await?;

    let mut open = Open {
        exit: None,
        pathname: "/etc/hostname".to_string(),
    };
    remote.write(&open).await?;
    open.exit = Some(Exit {
        result: 3,
        errorno: 0,
    });
    remote.write(&open).await?;

    let mut read = Read {
        exit: None,
        fd: 3,
        count: 4096,
    };
    remote.write(&read).await?;
    read.exit = Some(Exit {
        result: 12,
        errorno: 0,
    });
    remote.write(&read).await?;

    println!("sent 5 events to {}", path.display());
    Ok(())
}
