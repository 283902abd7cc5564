use clap::{Arg, Command};

pub const CMD_KEYGEN: &str = "keygen";
pub const ARG_PRIVATE_KEY_OUT: &str = "private-key-out";
pub const ARG_PUBLIC_KEY_OUT: &str = "public-key-out";

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_KEYGEN)
        .about("Generate a P-256 keypair for signing tokens")
        .arg(
            Arg::new(ARG_PRIVATE_KEY_OUT)
                .long(ARG_PRIVATE_KEY_OUT)
                .help("Where to write the private key (PKCS#8 PEM)")
                .default_value("jwt-private.pem"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_KEY_OUT)
                .long(ARG_PUBLIC_KEY_OUT)
                .help("Where to write the public key (SPKI PEM)")
                .default_value("jwt-public.pem"),
        )
}
