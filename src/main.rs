//! tun6-proxy command-line entry point.
//!
//! Creates a TUN device, configures it over netlink, and relays packets
//! between the device and a pair of UDP sockets on the IPv6 loopback.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tun6_proxy::{addr, netlink, socket, ProxyLoop, TunDevice, TunnelAddress};

/// Userspace IPv6 tunnel endpoint bridging a TUN device and two UDP sockets
#[derive(Parser)]
#[command(name = "tun6-proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// IPv6 address to assign to the tunnel interface, with optional /prefix
    #[arg(value_parser = addr::parse_address)]
    address: TunnelAddress,

    /// UDP port on [::1] that outgoing tunnel packets are sent to
    #[arg(value_parser = addr::parse_port)]
    send_port: u16,

    /// UDP port on [::1] that incoming tunnel packets are received on
    #[arg(value_parser = addr::parse_port)]
    recv_port: u16,

    /// Request a specific interface name instead of a kernel-assigned one
    #[arg(short, long)]
    interface: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!(
        address = %cli.address,
        send_port = cli.send_port,
        recv_port = cli.recv_port,
        "starting tun6-proxy"
    );

    let sender =
        socket::udp_sender(cli.send_port).context("failed to create UDP send socket")?;
    let receiver =
        socket::udp_receiver(cli.recv_port).context("failed to create UDP receive socket")?;

    let tun = TunDevice::open(cli.interface.as_deref()).context("failed to open TUN device")?;
    info!("created TUN device {}", tun.name());

    configure_interface(tun.name(), &cli.address)
        .with_context(|| format!("failed to configure {}", tun.name()))?;

    info!("initialization complete, entering forwarding loop");
    ProxyLoop::new(&tun, &sender, &receiver).run()?;
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Assign the address and bring the link up over a short-lived netlink
/// socket. Both messages are fire-and-forget; the channel is closed before
/// forwarding starts.
fn configure_interface(name: &str, address: &TunnelAddress) -> Result<()> {
    let index = netlink::interface_index(name)?;
    let route = netlink::RouteSocket::connect()?;

    route.send(&netlink::new_addr_v6(index, address))?;
    info!("assigned {address} to {name}");

    route.send(&netlink::link_up(index))?;
    info!("brought {name} up");

    Ok(())
}
