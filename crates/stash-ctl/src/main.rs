//! Interactive client: one whitespace-tokenized request per line, one typed
//! reply printed per request. Blank lines are no-ops, EOF exits.

use std::{
    io::{self, BufRead, Read, Write},
    net::TcpStream,
    process::ExitCode,
};

use stash_wire::{HEADER_LEN, MAX_MSG, Reply, encode_request};

const SERVER_ADDR: &str = "127.0.0.1:1234";

fn main() -> ExitCode {
    let stream = match TcpStream::connect(SERVER_ADDR) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("stash-ctl: connect {SERVER_ADDR}: {err}");
            return ExitCode::FAILURE;
        }
    };
    match repl(stream) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("stash-ctl: {err}");
            ExitCode::FAILURE
        }
    }
}

fn repl(mut stream: TcpStream) -> io::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("stash> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            continue;
        }

        let frame = match encode_request(&args) {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("request: {err}");
                continue;
            }
        };
        stream.write_all(&frame)?;
        print_reply(&read_reply(&mut stream)?);
    }
}

fn read_reply(stream: &mut TcpStream) -> io::Result<Reply> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MSG {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "reply frame over limit"));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Reply::decode(&body).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Nil => println!("(nil)"),
        Reply::Err { code, msg } => {
            println!("(err) {code} {}", String::from_utf8_lossy(msg));
        }
        Reply::Str(val) => println!("(str) {}", String::from_utf8_lossy(val)),
        Reply::Int(val) => println!("(int) {val}"),
        Reply::Arr(elems) => {
            println!("(arr) len = {}", elems.len());
            for elem in elems {
                print_reply(elem);
            }
            println!("(arr) end");
        }
    }
}
