use clap::Parser;
use shared::{decode, encode, records, Opcode, Packet, PACKET_SIZE};
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about = "Walks an account through login and into the world")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:27016")]
    server: SocketAddr,

    #[arg(short, long, default_value = "tester")]
    account: String,

    #[arg(short, long, default_value = "password")]
    password: String,

    #[arg(short, long, default_value = "Tester")]
    character: String,

    /// Seconds to stay in the world
    #[arg(short, long, default_value = "5")]
    duration: u64,
}

// Get current timestamp in milliseconds
fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

struct Client {
    socket: UdpSocket,
    server: SocketAddr,
    buf: [u8; PACKET_SIZE],
}

impl Client {
    async fn send(&self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        self.socket.send_to(&encode(&packet)?, self.server).await?;
        Ok(())
    }

    /// Waits for the first packet with one of `opcodes`, skipping world updates.
    async fn expect(&mut self, opcodes: &[Opcode]) -> Result<Packet, Box<dyn std::error::Error>> {
        loop {
            let (len, _) = timeout(Duration::from_secs(3), self.socket.recv_from(&mut self.buf)).await??;
            let packet = decode(&self.buf[..len])?;
            if opcodes.contains(&packet.opcode()) {
                return Ok(packet);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);
    let mut client = Client {
        socket,
        server: args.server,
        buf: [0u8; PACKET_SIZE],
    };

    client
        .send(Packet::new(Opcode::CreateAccount).arg(&args.account).arg(&args.password))
        .await?;
    let reply = client
        .expect(&[Opcode::CreateAccountSuccess, Opcode::CreateAccountFailure])
        .await?;
    println!("Create account: {:?} {:?}", reply.opcode(), reply.args());

    client
        .send(Packet::new(Opcode::Connect).arg(&args.account).arg(&args.password))
        .await?;
    let login = client.expect(&[Opcode::LoginSuccess, Opcode::LoginFailure]).await?;
    if login.opcode() == Opcode::LoginFailure {
        println!("Login failed: {:?}", login.args());
        return Ok(());
    }
    let account_id = login.args()[0].clone();
    let token = login.args()[1].clone();
    let characters: Vec<String> = records::parse(&login.args()[2])
        .into_iter()
        .filter_map(|record| record.into_iter().next())
        .collect();
    println!("Logged in as account {}, characters: {:?}", account_id, characters);

    let authed = |opcode: Opcode| Packet::new(opcode).arg(&account_id).arg(&token);

    if !characters.contains(&args.character) {
        client
            .send(authed(Opcode::CreateCharacter).arg(&args.character))
            .await?;
        let reply = client
            .expect(&[Opcode::CreateCharacterSuccess, Opcode::CreateCharacterFailure])
            .await?;
        println!("Create character: {:?} {:?}", reply.opcode(), reply.args());
    }

    client
        .send(authed(Opcode::EnterWorld).arg(&args.character))
        .await?;
    let world = client
        .expect(&[Opcode::EnterWorldSuccess, Opcode::EnterWorldFailure])
        .await?;
    if world.opcode() == Opcode::EnterWorldFailure {
        println!("Enter world failed: {:?}", world.args());
        return Ok(());
    }
    println!(
        "Entered the world as entity {} at ({}, {}, {})",
        world.args()[0],
        world.args()[2],
        world.args()[3],
        world.args()[4]
    );

    client.send(Packet::new(Opcode::Ping).arg(get_timestamp())).await?;
    let pong = client.expect(&[Opcode::Pong]).await?;
    if let Some(sent) = pong.args().first().and_then(|t| t.parse::<u64>().ok()) {
        println!("Round trip: {}ms", get_timestamp().saturating_sub(sent));
    }

    for _ in 0..args.duration {
        client.send(authed(Opcode::Heartbeat)).await?;
        let update = client
            .expect(&[Opcode::NpcUpdate, Opcode::OtherPlayerUpdate])
            .await?;
        println!("{:?}: {:?}", update.opcode(), update.args());
        sleep(Duration::from_secs(1)).await;
    }

    client.send(authed(Opcode::Disconnect)).await?;
    println!("Test client finished");
    Ok(())
}
