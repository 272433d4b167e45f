//! Ping-pong over a loopback TCP connection using length-prefixed frames

use std::error::Error;
use std::net::{TcpListener, TcpStream};
use std::thread;

use framing::{ByteOrder, FramedStream, FramingConfig, PrefixWidth};

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Framing Ping-Pong Example");
    println!("=========================\n");

    let config = FramingConfig::new(PrefixWidth::Two, ByteOrder::Big);
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let server = thread::spawn(move || -> Result<(), Box<dyn Error + Send + Sync>> {
        let (conn, peer) = listener.accept()?;
        let mut framed = FramedStream::with_config(conn, config);
        loop {
            let frame = match framed.read_frame() {
                Ok(frame) => frame,
                Err(err) if err.is_eof() => break,
                Err(err) => return Err(err.into()),
            };
            println!("server <- {peer}: {:?}", String::from_utf8_lossy(&frame));

            let mut reply = b"pong: ".to_vec();
            reply.extend_from_slice(&frame);
            framed.write_frame(&reply)?;
        }
        Ok(())
    });

    let mut client = FramedStream::with_config(TcpStream::connect(addr)?, config);
    println!(
        "client connected with {} {} prefixes (max {} bytes per frame)",
        client.prefix_width(),
        client.byte_order(),
        client.max_frame_size()
    );

    for ping in ["ping", "ping again", "last ping"] {
        client.write_frame(ping.as_bytes())?;
        let reply = client.read_frame()?;
        println!("client <- server: {:?}", String::from_utf8_lossy(&reply));
    }
    client.close()?;

    server.join().map_err(|_| "server thread panicked")??;

    let totals = framing::metrics();
    println!(
        "\nframes sent: {}, received: {}",
        totals.frames_sent, totals.frames_received
    );

    Ok(())
}
