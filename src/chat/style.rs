use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use std::io::{self, Write};
use unicode_width::UnicodeWidthStr;

use super::session::{ChatReply, ToolInvocation};

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 200,
        b: 220,
    };
    pub const PURPLE: Color = Color::Rgb {
        r: 180,
        g: 100,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 220,
        b: 120,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

mod glyphs {
    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const ARROW_RIGHT: &str = "▶";
    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const DIAMOND: &str = "◆";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
}

const BOX_WIDTH: usize = 64;

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        glyphs::CHECK.with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        glyphs::CROSS_MARK.with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

pub fn print_section_header(title: &str) {
    let title_len = title.width();
    let padding = BOX_WIDTH.saturating_sub(title_len + 4) / 2;

    println!();
    print!("{}", glyphs::ROUND_TOP_LEFT.with(colors::CYAN));
    print!("{}", glyphs::HORIZONTAL.repeat(padding).with(colors::CYAN));
    print!(
        " {} ",
        title.with(colors::CYAN).bold().attribute(Attribute::Italic)
    );
    print!(
        "{}",
        glyphs::HORIZONTAL
            .repeat(BOX_WIDTH.saturating_sub(title_len + 4 + padding))
            .with(colors::CYAN)
    );
    println!("{}", glyphs::ROUND_TOP_RIGHT.with(colors::CYAN));
}

pub fn print_section_footer() {
    print!("{}", glyphs::ROUND_BOTTOM_LEFT.with(colors::CYAN));
    print!("{}", glyphs::HORIZONTAL.repeat(BOX_WIDTH).with(colors::CYAN));
    println!("{}", glyphs::ROUND_BOTTOM_RIGHT.with(colors::CYAN));
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        glyphs::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_list_item(item: &str, detail: &str, indent: usize) {
    let indent_str = "  ".repeat(indent);
    if detail.is_empty() {
        println!(
            "{}{}  {}",
            indent_str,
            glyphs::ARROW_RIGHT.with(colors::CYAN),
            item.with(colors::GREEN).bold()
        );
    } else {
        println!(
            "{}{}  {}  {}",
            indent_str,
            glyphs::ARROW_RIGHT.with(colors::CYAN),
            item.with(colors::GREEN).bold(),
            detail.with(colors::WHITE)
        );
    }
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        glyphs::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

/// Plain prompt, rustyline miscounts the width of styled ones.
pub const PROMPT: &str = "you> ";

pub fn print_welcome(endpoint: &str, deployment: &str) {
    let lines = [
        ("Endpoint", endpoint),
        ("Deployment", deployment),
        ("Version", env!("CARGO_PKG_VERSION")),
    ];

    print!("  {}", glyphs::ROUND_TOP_LEFT.with(colors::PURPLE));
    print!("{}", glyphs::HORIZONTAL.repeat(BOX_WIDTH).with(colors::PURPLE));
    println!("{}", glyphs::ROUND_TOP_RIGHT.with(colors::PURPLE));

    print_box_line("Catalog chat", colors::GREEN);
    print_box_line("", colors::WHITE);
    for (key, value) in lines {
        print!("  {}", glyphs::VERTICAL.with(colors::PURPLE));
        let text = format!("  {}: {}", key, value);
        print!(
            "  {} {}",
            format!("{}:", key).with(colors::DIM),
            value.with(colors::WHITE)
        );
        print!("{}", " ".repeat(BOX_WIDTH.saturating_sub(text.width())));
        println!("{}", glyphs::VERTICAL.with(colors::PURPLE));
    }
    print_box_line("", colors::WHITE);
    print_box_line(
        "Attach a tool server with /connect <name> <command> [args...]",
        colors::DIM,
    );
    print_box_line("Type /help for every command, /exit to leave", colors::DIM);

    print!("  {}", glyphs::ROUND_BOTTOM_LEFT.with(colors::PURPLE));
    print!("{}", glyphs::HORIZONTAL.repeat(BOX_WIDTH).with(colors::PURPLE));
    println!("{}", glyphs::ROUND_BOTTOM_RIGHT.with(colors::PURPLE));
    println!();
}

fn print_box_line(text: &str, color: crossterm::style::Color) {
    let text = format!("  {}", text);
    print!("  {}", glyphs::VERTICAL.with(colors::PURPLE));
    print!("{}", text.as_str().with(color));
    print!("{}", " ".repeat(BOX_WIDTH.saturating_sub(text.width())));
    println!("{}", glyphs::VERTICAL.with(colors::PURPLE));
}

pub struct CommandHelp {
    pub name: &'static str,
    pub args: &'static str,
    pub description: &'static str,
}

pub fn print_help(commands: &[CommandHelp]) {
    print_section_header("Commands");
    println!();
    for cmd in commands {
        println!(
            "  {} {} {}  {}",
            glyphs::DIAMOND.with(colors::PURPLE),
            format!("/{}", cmd.name).with(colors::GREEN).bold(),
            cmd.args.with(colors::DIM),
            cmd.description.with(colors::WHITE)
        );
    }
    println!();
    println!(
        "  {}",
        "Anything else is sent to the assistant.".with(colors::DIM)
    );
    print_section_footer();
}

pub fn print_tool_invocation(invocation: &ToolInvocation) {
    let server = invocation.server.as_deref().unwrap_or("none");
    let line = format!("{} ({})", invocation.tool, server);
    if invocation.is_error {
        println!(
            "  {} {}",
            glyphs::CROSS_MARK.with(colors::RED),
            line.with(colors::DIM)
        );
    } else {
        println!(
            "  {} {}",
            glyphs::CHECK.with(colors::GREEN),
            line.with(colors::DIM)
        );
    }
}

pub fn print_reply(reply: &ChatReply) {
    for invocation in &reply.tool_invocations {
        print_tool_invocation(invocation);
    }
    println!();
    println!("{} {}", "assistant>".with(colors::CYAN).bold(), reply.content);
    println!();
}

pub fn print_goodbye() {
    println!();
    println!("  {}", "Goodbye!".with(colors::PURPLE).bold());
    println!();
}

pub fn flush() {
    let _ = io::stdout().flush();
}
