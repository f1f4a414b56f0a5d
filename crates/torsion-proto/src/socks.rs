//! A minimal SOCKS5 client: exactly what we need to ask the local Tor
//! daemon for a connection to an onion address.
//!
//! Tor's SOCKS port accepts the standard protocol with no authentication,
//! and resolves hostnames itself; we always send the onion hostname with
//! address type DOMAIN so that no name resolution happens locally.

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};

use torsion_bytes::Writer;

/// The one SOCKS version we speak.
const SOCKS_VERSION: u8 = 5;
/// Method code for "no authentication required".
const NO_AUTHENTICATION: u8 = 0;
/// Reply from a proxy that likes none of our authentication methods.
const NO_ACCEPTABLE_METHOD: u8 = 0xff;
/// Command code for CONNECT.
const CMD_CONNECT: u8 = 1;
/// Address type code for a hostname.
const ATYP_DOMAIN: u8 = 3;
/// Address type code for an IPv4 address.
const ATYP_V4: u8 = 1;
/// Address type code for an IPv6 address.
const ATYP_V6: u8 = 4;

/// Negotiate a SOCKS5 CONNECT to `host:port` over `stream`.
///
/// On success, the proxy has attached the stream to the requested
/// destination, and we hand the stream back for the caller's protocol to
/// use.  Any refusal from the proxy becomes an [`IoError`].
pub(crate) async fn connect_over<S>(mut stream: S, host: &str, port: u16) -> IoResult<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    // Method negotiation: we offer exactly one method, "no auth".
    stream
        .write_all(&[SOCKS_VERSION, 1, NO_AUTHENTICATION])
        .await?;
    stream.flush().await?;

    let mut reply = [0_u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS_VERSION {
        return Err(bad_proxy("unexpected SOCKS version in method reply"));
    }
    match reply[1] {
        NO_AUTHENTICATION => (),
        NO_ACCEPTABLE_METHOD => return Err(bad_proxy("proxy requires authentication")),
        _ => return Err(bad_proxy("proxy chose a method we did not offer")),
    }

    // CONNECT request, hostname sent as-is for the proxy to resolve.
    stream.write_all(&connect_request(host, port)?).await?;
    stream.flush().await?;

    let mut reply = [0_u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS_VERSION {
        return Err(bad_proxy("unexpected SOCKS version in connect reply"));
    }
    if reply[1] != 0 {
        return Err(IoError::new(
            ErrorKind::ConnectionRefused,
            format!("SOCKS proxy refused connection: {}", status_msg(reply[1])),
        ));
    }

    // Skip the bound address: we don't use it, but it must be drained.
    let addr_len = match reply[3] {
        ATYP_V4 => 4_usize,
        ATYP_V6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0_u8; 1];
            stream.read_exact(&mut len).await?;
            usize::from(len[0])
        }
        _ => return Err(bad_proxy("unrecognized address type in connect reply")),
    };
    let mut scratch = vec![0_u8; addr_len + 2]; // address + port
    stream.read_exact(&mut scratch).await?;

    Ok(stream)
}

/// Build the CONNECT request message for `host:port`.
fn connect_request(host: &str, port: u16) -> IoResult<Vec<u8>> {
    let hostname = host.as_bytes();
    let len: u8 = hostname
        .len()
        .try_into()
        .map_err(|_| IoError::new(ErrorKind::InvalidInput, "hostname too long for SOCKS5"))?;

    let mut msg: Vec<u8> = Vec::new();
    msg.write_u8(SOCKS_VERSION);
    msg.write_u8(CMD_CONNECT);
    msg.write_u8(0); // reserved
    msg.write_u8(ATYP_DOMAIN);
    msg.write_u8(len);
    torsion_bytes::Writer::write_all(&mut msg, hostname);
    msg.write_u16(port);
    Ok(msg)
}

/// Helper: an [`IoError`] for a proxy that broke the protocol.
fn bad_proxy(msg: &'static str) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg)
}

/// Return a human-readable message for a SOCKS5 reply code.
fn status_msg(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown failure",
    }
}
