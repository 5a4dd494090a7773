//! Command line parsing

use anyhow::{Context, Result, anyhow, bail};

#[derive(Clone, Debug, PartialEq)]
pub enum EqCommand {
    Show,
    On,
    Off,
    Preset(String),
    Band { frequency: u32, gain_db: f32 },
    Reset,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FadeCommand {
    Show,
    On,
    Off,
    Duration(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum VizCommand {
    Show,
    On,
    Off,
    Bars(usize),
    Sensitivity(f32),
}

/// One line typed at the prompt. Track numbers are 1-based and refer to the
/// last listing (search, trending, likes) unless noted.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Search(String),
    Trending,
    Play(usize),
    Add(usize),
    NextUp(usize),
    /// Queue position
    Remove(usize),
    Clear,
    Queue,
    Next,
    Prev,
    Pause,
    Seek(f32),
    Volume(f32),
    Shuffle,
    Repeat,
    Eq(EqCommand),
    Xfade(FadeCommand),
    Sleep(u32),
    Like,
    Likes,
    PlayLiked,
    Sync,
    Login { username: String, password: String },
    Logout,
    Lyrics,
    Viz(VizCommand),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
search <query>      find tracks
trending            list trending tracks
play <n>            play track n of the last listing
add <n>             append track n to the queue
next-up <n>         play track n after the current one
queue               show the queue
remove <n>          remove queue position n
clear               clear the queue
next | prev | pause
seek <percent>      jump within the current track
vol <0-100>         set volume
shuffle | repeat    toggle shuffle, cycle repeat
eq [on|off|reset|<preset>|<hz> <db>]
xfade [on|off|<seconds>]
sleep <minutes>     pause after a while, 0 cancels
like | likes | likes play | sync
login <user> <password> | logout
lyrics | viz [on|off|bars <n>|sens <x>] | status | quit";

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match word.to_ascii_lowercase().as_str() {
            "search" | "s" => {
                if rest.is_empty() {
                    bail!("usage: search <query>");
                }
                Command::Search(rest.to_string())
            }
            "trending" => Command::Trending,
            "play" | "p" if rest.is_empty() => Command::Pause,
            "play" | "p" => Command::Play(position(rest)?),
            "add" => Command::Add(position(rest)?),
            "next-up" | "nextup" => Command::NextUp(position(rest)?),
            "remove" | "rm" => Command::Remove(position(rest)?),
            "clear" => Command::Clear,
            "queue" | "q" => Command::Queue,
            "next" | "n" => Command::Next,
            "prev" | "previous" => Command::Prev,
            "pause" | "resume" => Command::Pause,
            "seek" => Command::Seek(number(rest, "percent")?),
            "vol" | "volume" => Command::Volume(number::<f32>(rest, "volume")? / 100.0),
            "shuffle" => Command::Shuffle,
            "repeat" => Command::Repeat,
            "eq" => Command::Eq(parse_eq(&args)?),
            "xfade" | "crossfade" => Command::Xfade(parse_fade(&args)?),
            "sleep" => Command::Sleep(number(rest, "minutes")?),
            "like" => Command::Like,
            "likes" if args.first() == Some(&"play") => Command::PlayLiked,
            "likes" => Command::Likes,
            "sync" => Command::Sync,
            "login" => match args.as_slice() {
                [username, password] => Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                _ => bail!("usage: login <user> <password>"),
            },
            "logout" => Command::Logout,
            "lyrics" => Command::Lyrics,
            "viz" => Command::Viz(parse_viz(&args)?),
            "status" | "st" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command '{}', try 'help'", other),
        };
        Ok(command)
    }
}

fn number<T: std::str::FromStr>(arg: &str, what: &str) -> Result<T> {
    arg.trim()
        .parse()
        .map_err(|_| anyhow!("expected a number for {}, got '{}'", what, arg))
}

/// 1-based position turned into an index
fn position(arg: &str) -> Result<usize> {
    let n: usize = number(arg, "track number")?;
    n.checked_sub(1).context("track numbers start at 1")
}

fn parse_eq(args: &[&str]) -> Result<EqCommand> {
    Ok(match args {
        [] => EqCommand::Show,
        ["on"] => EqCommand::On,
        ["off"] => EqCommand::Off,
        ["reset"] => EqCommand::Reset,
        [frequency, gain] => EqCommand::Band {
            frequency: number(frequency, "band")?,
            gain_db: number(gain, "gain")?,
        },
        [preset] => EqCommand::Preset(preset.to_ascii_lowercase()),
        _ => bail!("usage: eq [on|off|reset|<preset>|<hz> <db>]"),
    })
}

fn parse_fade(args: &[&str]) -> Result<FadeCommand> {
    Ok(match args {
        [] => FadeCommand::Show,
        ["on"] => FadeCommand::On,
        ["off"] => FadeCommand::Off,
        [seconds] => FadeCommand::Duration(number(seconds, "seconds")?),
        _ => bail!("usage: xfade [on|off|<seconds>]"),
    })
}

fn parse_viz(args: &[&str]) -> Result<VizCommand> {
    Ok(match args {
        [] => VizCommand::Show,
        ["on"] => VizCommand::On,
        ["off"] => VizCommand::Off,
        ["bars", n] => VizCommand::Bars(number(n, "bars")?),
        ["sens", x] | ["sensitivity", x] => VizCommand::Sensitivity(number(x, "sensitivity")?),
        _ => bail!("usage: viz [on|off|bars <n>|sens <x>]"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transport_commands() {
        assert_eq!(Command::parse("next").unwrap(), Command::Next);
        assert_eq!(Command::parse("  PAUSE ").unwrap(), Command::Pause);
        assert_eq!(Command::parse("play").unwrap(), Command::Pause);
        assert_eq!(Command::parse("play 3").unwrap(), Command::Play(2));
        assert_eq!(Command::parse("seek 40").unwrap(), Command::Seek(40.0));
        assert_eq!(Command::parse("vol 50").unwrap(), Command::Volume(0.5));
        assert_eq!(Command::parse("sleep 0").unwrap(), Command::Sleep(0));
    }

    #[test]
    fn search_keeps_the_whole_query() {
        assert_eq!(
            Command::parse("search  daft punk  ").unwrap(),
            Command::Search("daft punk".to_string())
        );
        assert!(Command::parse("search").is_err());
    }

    #[test]
    fn parses_enhancement_commands() {
        assert_eq!(Command::parse("eq Rock").unwrap(), Command::Eq(EqCommand::Preset("rock".into())));
        assert_eq!(
            Command::parse("eq 1000 -4.5").unwrap(),
            Command::Eq(EqCommand::Band { frequency: 1000, gain_db: -4.5 })
        );
        assert_eq!(Command::parse("xfade 4").unwrap(), Command::Xfade(FadeCommand::Duration(4.0)));
        assert_eq!(Command::parse("viz bars 32").unwrap(), Command::Viz(VizCommand::Bars(32)));
        assert_eq!(Command::parse("likes play").unwrap(), Command::PlayLiked);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("play 0").is_err());
        assert!(Command::parse("play x").is_err());
        assert!(Command::parse("login onlyuser").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
