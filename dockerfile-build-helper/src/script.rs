use crate::models::{Architecture, VerifiedImage};

const INDENT_WIDTH: usize = 4;

#[derive(Debug, Default)]
pub struct ScriptBuilder {
    buffer: String,
    indent: usize,
}

impl ScriptBuilder {
    pub fn new() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    pub fn line<S: AsRef<str>>(&mut self, line: S) -> &mut ScriptBuilder {
        let line = line.as_ref();
        if !line.is_empty() {
            self.buffer.push_str(&" ".repeat(self.indent * INDENT_WIDTH));
            self.buffer.push_str(line);
        }
        self.buffer.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut ScriptBuilder {
        self.line("")
    }

    pub fn indent(&mut self) -> &mut ScriptBuilder {
        self.indent += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut ScriptBuilder {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn finish(self) -> String {
        self.buffer.replace("\r\n", "\n")
    }
}

fn header(builder: &mut ScriptBuilder) {
    builder
        .line("#!/bin/bash")
        .blank()
        .line(concat!(
            "# This file is automatically generated by ",
            env!("CARGO_PKG_NAME"),
            ", rerun it to update it"
        ))
        .line("set -e")
        .line("DOCKERFILE=\"\"")
        .blank()
        .blank();
}

fn stanza(builder: &mut ScriptBuilder, image: &VerifiedImage) {
    let info = &image.info;
    let name = &info.image.name;

    builder.line(format!("# Build {}", name));

    // Without an amd64 Dockerfile some hosts have nothing to build.
    let conditional = match image.dockerfile(Architecture::Amd64) {
        Some(dockerfile) => {
            builder
                .line(format!("# {}", dockerfile.url))
                .line(format!("DOCKERFILE=\"{}\"", dockerfile.resolved_path));
            false
        }
        None => {
            builder.line("DOCKERFILE=\"\"");
            true
        }
    };

    for architecture in Architecture::ALL.iter().copied() {
        let (machine, dockerfile) = match (architecture.machine(), image.dockerfile(architecture)) {
            (Some(machine), Some(dockerfile)) => (machine, dockerfile),
            _ => continue,
        };

        builder.line(format!("# {}", dockerfile.url)).line(format!(
            "[[ \"$(uname -m)\" == \"{}\" ]] && DOCKERFILE=\"{}\"",
            machine, dockerfile.resolved_path
        ));
    }

    if conditional {
        builder.line("if [[ \"$DOCKERFILE\" ]]; then").indent();
    }

    builder
        .line(format!("echo \"Building {}\"", info.image))
        .line(format!("git clone {} {}", info.git_link, name))
        .line(format!("cd {}", name))
        .line(format!("git checkout {}", info.git_ref))
        .line("cd \"$(dirname $DOCKERFILE)\"")
        .line(format!("docker build -f \"$DOCKERFILE\" -t \"{}\" .", info.image))
        .line("cd - && cd ..");

    if conditional {
        builder.dedent().line("fi");
    }

    builder.blank().blank();
}

pub fn generate(images: &[VerifiedImage]) -> String {
    let mut builder = ScriptBuilder::new();
    header(&mut builder);

    for image in images {
        stanza(&mut builder, image);
    }

    builder.finish()
}
