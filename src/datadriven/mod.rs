//! Data-driven test harness.
//!
//! A test file is a sequence of cases:
//!
//! ```text
//! # comment
//! command arg=value arg=(a, b)
//! optional input lines
//! ----
//! expected output
//! ```
//!
//! Cases are separated by blank lines.

use std::{fs, path::Path};

use regex::Regex;

use crate::error::{Error, Result};

#[derive(Default)]
pub struct TestData {
    pub pos: String,
    pub cmd: String,
    pub cmd_args: Vec<CmdArg>,
    pub input: String,
    pub expected: String,
}

pub struct CmdArg {
    pub key: String,
    pub vals: Vec<String>,
}

impl CmdArg {
    pub fn string(&self, idx: usize) -> String {
        self.vals[idx].clone()
    }
    pub fn uint64(&self, idx: usize) -> u64 {
        self.vals[idx].parse().unwrap()
    }
}

impl TestData {
    pub fn find_arg(&self, key: &str) -> Option<&CmdArg> {
        self.cmd_args.iter().find(|&f| f.key == key)
    }
    pub fn scan_args(&self, key: &str) -> &CmdArg {
        if let Some(arg) = self.find_arg(key) {
            arg
        } else {
            panic!("{}: missing args: {}", self.pos, key);
        }
    }
    pub fn has_arg(&self, key: &str) -> bool {
        self.find_arg(key).is_some()
    }
}

pub fn run_test<F: FnMut(&TestData) -> String>(path: impl AsRef<Path>, f: F) {
    let path = path.as_ref();
    let content = fs::read_to_string(path).unwrap();
    run_test_from_source(&content, &path.display().to_string(), f);
}

pub fn run_test_from_string<F: FnMut(&TestData) -> String>(input: impl AsRef<str>, f: F) {
    run_test_from_source(input.as_ref(), "<string>", f);
}

fn run_test_from_source<F: FnMut(&TestData) -> String>(input: &str, source: &str, mut f: F) {
    let datas = parse_test_data(input, source).unwrap();
    for data in datas.iter() {
        let s = f(data);
        assert_eq!(s, data.expected, "{}: {}", data.pos, data.cmd);
    }
}

pub fn parse_test_data(input: &str, source: &str) -> Result<Vec<TestData>> {
    let mut datas = Vec::new();
    let mut iter = input.lines().enumerate();

    while let Some((line_no, line)) = iter.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = split_directive(line)
            .ok_or_else(|| Error::InvalidArgument(format!("{}:{}: cannot parse directive: {}", source, line_no + 1, line)))?;

        let mut data = TestData {
            pos: format!("{}:{}", source, line_no + 1),
            cmd: fields[0].clone(),
            ..Default::default()
        };
        for arg in &fields[1..] {
            data.cmd_args.push(parse_arg(arg));
        }

        let mut input = String::new();
        let mut separator = false;
        for (_, line) in iter.by_ref() {
            if line == "----" {
                separator = true;
                break;
            }
            if line.trim().is_empty() {
                break;
            }
            input.push_str(line);
            input.push('\n');
        }
        data.input = input.trim().to_owned();

        if separator {
            for (_, line) in iter.by_ref() {
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                data.expected.push_str(line);
                data.expected.push('\n');
            }
        }
        datas.push(data);
    }

    Ok(datas)
}

fn parse_arg(arg: &str) -> CmdArg {
    if let Some(idx) = arg.find('=') {
        let key = arg[0..idx].to_owned();
        let val = &arg[idx + 1..];
        let vals = if val.len() >= 2 && val.starts_with('(') && val.ends_with(')') {
            val[1..val.len() - 1]
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect()
        } else {
            vec![val.to_owned()]
        };
        CmdArg { key, vals }
    } else {
        CmdArg {
            key: arg.to_owned(),
            vals: Vec::new(),
        }
    }
}

const PATTERN: &str = r"^ *[a-zA-Z0-9_/,-\.]+(|=[-a-zA-Z0-9_@]+|=\([^)]*\))( |$)";

fn split_directive(mut line: &str) -> Option<Vec<String>> {
    let p = Regex::new(PATTERN).unwrap();
    let mut results = Vec::new();
    while !line.is_empty() {
        let m = p.find(line)?;
        let v = m.as_str();
        line = &line[v.len()..];
        results.push(v.trim().to_string());
    }
    if results.is_empty() {
        None
    } else {
        Some(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_directive() {
        let input = "make argTuple=(1, 🍌) argInt=12 argString=greedily argString=totally_ignored";
        let cmds = split_directive(input).unwrap();
        assert_eq!(cmds.len(), 5);
        assert_eq!(cmds[0], "make");
        assert_eq!(cmds.last().unwrap(), "argString=totally_ignored");
    }

    #[test]
    fn test_from_string() {
        let input = r"
# NB: we allow duplicate args. ScanArgs simply picks the first occurrence.
make argTuple=(1, 🍌) argInt=12 argString=greedily argString=totally_ignored
sentence
----
Did the following: make sentence
1 hungry monkey eats a 🍌
while 12 other monkeys watch greedily

count
----
2
";
        let mut calls = 0;
        run_test_from_string(input, |t| {
            calls += 1;
            match t.cmd.as_str() {
                "make" => {
                    assert_eq!(t.input, "sentence");
                    assert_eq!(t.cmd_args.len(), 4);
                    let arg_str = t.scan_args("argString");
                    assert_eq!(arg_str.string(0), "greedily");
                    let arg_int = t.scan_args("argInt");
                    assert_eq!(arg_int.uint64(0), 12);
                    let arg_tuple = t.scan_args("argTuple");
                    assert_eq!(arg_tuple.uint64(0), 1);
                    format!(
                        "Did the following: {} {}\n{} hungry monkey eats a {}\nwhile {} other monkeys watch {}\n",
                        t.cmd,
                        t.input,
                        arg_tuple.uint64(0),
                        arg_tuple.string(1),
                        arg_int.uint64(0),
                        arg_str.string(0)
                    )
                }
                "count" => format!("{}\n", calls),
                cmd => panic!("unknown command {}", cmd),
            }
        });
        assert_eq!(calls, 2);
    }
}
