use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();
    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
        CompletionShell::Powershell => {
            generate_for_shell(shells::PowerShell, &mut command, &mut buffer);
        }
        CompletionShell::Elvish => generate_for_shell(shells::Elvish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "shopsync", buffer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn run_completions_writes_bash_script_file() {
        let output_path = std::env::temp_dir().join(format!(
            "shopsync-completions-test-{}.bash",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_nanos())
        ));

        run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

        let script = std::fs::read_to_string(&output_path).unwrap();
        assert!(script.contains("_shopsync()"));
        assert!(script.contains("complete -F _shopsync"));

        let _ = std::fs::remove_file(output_path);
    }
}
