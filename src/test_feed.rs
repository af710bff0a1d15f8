//! Builders for fixed-width CIF lines used across the unit tests.

fn pad(mut line: String) -> String {
    while line.len() < 80 {
        line.push(' ');
    }
    line
}

/// Basic schedule: uid, valid from/to (YYMMDD), day mask, STP indicator.
pub fn bs(uid: &str, valid_from: &str, valid_to: &str, days: &str, flag: char) -> String {
    let mut line = format!("BSN{uid:<6}{valid_from}{valid_to}{days} POO");
    while line.len() < 79 {
        line.push(' ');
    }
    line.push(flag);
    line
}

pub fn bx(operator: &str) -> String {
    pad(format!("BX{:<9}{operator:<2}", ""))
}

pub fn lo(tiploc: &str, time: &str) -> String {
    pad(format!("LO{tiploc:<8}{time} {time}"))
}

pub fn li_station(tiploc: &str, time: &str) -> String {
    pad(format!("LI{tiploc:<8}{time} {time} {:5}{time}{time}", ""))
}

pub fn li_pass(tiploc: &str, time: &str) -> String {
    pad(format!("LI{tiploc:<8}{:10}{time} 00000000", ""))
}

pub fn lt(tiploc: &str, time: &str) -> String {
    pad(format!("LT{tiploc:<8}{time} {time}"))
}

/// Owns a feed's lines and hands out the `&str` view the parser takes.
pub struct Feed(pub Vec<String>);

impl Feed {
    pub fn lines(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}
