use cmdtree::{Arg, Cmd, Value};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let app = Cmd::new("hello")
        .brief("Greets people")
        .epilog("Set RUST_LOG=cmdtree=debug to trace dispatch.")
        .arg(Arg::new("loud").options(["-l", "--loud"]).count(0).help("Shout the greeting"))
        .run(|cmd, bundle| {
            if bundle.value(cmd, "loud").and_then(Value::as_bool) == Some(true) {
                eprintln!("(loudly)");
            }
            0
        })
        .cmd(
            Cmd::new("greet")
                .brief("Say hello to someone")
                .arg(Arg::new("name").count('+'))
                .arg(Arg::new("greeting").option("--greeting").default("hello"))
                .run(|cmd, bundle| {
                    let greeting = bundle.value(cmd, "greeting").map(ToString::to_string);
                    let names = bundle.value(cmd, "name").map(ToString::to_string);
                    println!("{}, {}", greeting.unwrap_or_default(), names.unwrap_or_default());
                    0
                }),
        )
        .cmd(
            Cmd::new("count")
                .brief("Count to a number\nbetween 1 and 3")
                .arg(Arg::new("to").choices([1, 2, 3]))
                .run(|cmd, bundle| match bundle.value(cmd, "to").and_then(Value::as_int) {
                    Some(to) => {
                        (1..=to).for_each(|it| println!("{it}"));
                        0
                    }
                    None => 1,
                }),
        );

    cmdtree::main_or_exit(&app)
}
