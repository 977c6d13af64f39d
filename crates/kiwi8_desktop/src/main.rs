use std::{
    num::NonZeroU32,
    path::PathBuf,
    rc::Rc,
    time::{Duration, Instant}
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, StartCause, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::PhysicalKey,
    window::{Fullscreen, Window, WindowBuilder}
};

use kiwi8_core::{
    globals::{DEFAULT_STEPS_PER_TICK, SCREEN_WIDTH, SCREEN_HEIGHT},
    Config, Control, Cpu, Machine, Quirks, State
};

mod audio;
mod input;
mod render;

use input::{Action, Input};
use render::Renderer;

const SCALING: usize = 10;
const W: usize = SCALING * SCREEN_WIDTH;
const H: usize = SCALING * SCREEN_HEIGHT;
const FRAME: Duration = Duration::from_micros(16_667);
const TITLE: &str = "Kiwi8";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Rom to run
    rom: PathBuf,
    /// Instructions executed per 60Hz tick
    #[arg(short, long, default_value_t = DEFAULT_STEPS_PER_TICK)]
    steps: usize,
    /// FX55/FX65 leave I unchanged
    #[arg(long)]
    load_store_quirk: bool,
    /// 8XY6/8XYE shift VX in place, ignoring VY
    #[arg(long)]
    shift_quirk: bool,
    /// Wrap sprites around the screen edges instead of clipping them
    #[arg(long)]
    vwrap: bool,
    #[arg(short, long)]
    muted: bool,
    #[arg(short, long)]
    fullscreen: bool,
    /// Foreground color, RRGGBB
    #[arg(short, long, default_value = "ffffff", value_parser = render::parse_color)]
    color: u32,
}
impl Args {
    fn config(&self) -> Config {
        Config {
            steps: self.steps,
            quirks: Quirks {
                load_store: self.load_store_quirk,
                shift: self.shift_quirk,
            },
            vwrap: self.vwrap,
            muted: self.muted,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut cpu = Cpu::new();
    cpu.load(&args.rom)
        .with_context(|| format!("unable to load {}", args.rom.display()))?;

    let event_loop = EventLoop::new()
        .map_err(|e| anyhow!("unable to create event loop: {e}"))?;
    let window = Rc::new(
        WindowBuilder::new()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(W as u32, H as u32))
            .build(&event_loop)
            .map_err(|e| anyhow!("unable to create window: {e}"))?
    );
    if args.fullscreen {
        toggle_fullscreen(&window);
    }
    let context = softbuffer::Context::new(window.clone())
        .map_err(|e| anyhow!("unable to create graphics context: {e}"))?;
    let mut surface = softbuffer::Surface::new(&context, window.clone())
        .map_err(|e| anyhow!("unable to create surface: {e}"))?;
    let mut beeper = audio::get_device()?;

    let renderer = Renderer::new(args.color);
    let mut input = Input::new();
    let mut machine = Machine::start(cpu, args.config())?;
    let mut reported = false;

    event_loop.run(move |event, elwt| {
        match event {
            Event::NewEvents(StartCause::Init | StartCause::ResumeTimeReached { .. }) => {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::WaitUntil(Instant::now() + FRAME));
            },
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Focused(false) => input.release_all(),
                WindowEvent::DroppedFile(path) => input.handle_drop(path),
                WindowEvent::KeyboardInput {
                    event: KeyEvent { physical_key: PhysicalKey::Code(code), state, repeat: false, .. },
                    ..
                } => {
                    match input.handle_key(code, state == ElementState::Pressed) {
                        Some(Action::TogglePause) => machine.toggle_pause(),
                        Some(Action::ToggleMute) => machine.toggle_mute(),
                        Some(Action::ToggleWrap) => {
                            if let Some(config) = machine.config() {
                                machine.set_vwrap(!config.vwrap);
                            }
                        },
                        Some(Action::ToggleFullscreen) => toggle_fullscreen(&window),
                        None => ()
                    }
                },
                WindowEvent::RedrawRequested => {
                    let (keys, control) = input.poll();
                    handle_control(control, &mut input, &mut machine, elwt);
                    let Some(snapshot) = machine.sync(keys) else {
                        log::error!("machine state unavailable");
                        elwt.exit();
                        return;
                    };
                    beeper.update(snapshot.sound);
                    let stopped = snapshot.state == State::Terminated;
                    if stopped != reported {
                        match machine.fault() {
                            Some(fault) if stopped => window.set_title(&format!("{TITLE} - stopped: {fault}")),
                            _ => window.set_title(TITLE)
                        }
                        reported = stopped;
                    }
                    if let Err(e) = present(&window, &mut surface, &renderer, &snapshot.frame) {
                        log::error!("{e}");
                        elwt.exit();
                    }
                },
                _ => ()
            },
            _ => ()
        }
    }).map_err(|e| anyhow!("event loop failed: {e}"))?;
    Ok(())
}

fn handle_control(
    control: Control,
    input: &mut Input,
    machine: &mut Machine,
    elwt: &EventLoopWindowTarget<()>
) {
    if control.contains(Control::USER_QUIT) {
        elwt.exit();
        return;
    }
    if control.contains(Control::LOAD_ROM) {
        if let Some(path) = input.take_rom() {
            match machine.load(&path) {
                Ok(()) => log::info!("switched to {}", path.display()),
                Err(e) => log::warn!("keeping current rom, {} failed: {e}", path.display())
            }
        }
    } else if control.contains(Control::SOFT_RESET) {
        if let Err(e) = machine.soft_reset() {
            log::error!("soft reset failed: {e}");
        }
    }
}

fn present(
    window: &Rc<Window>,
    surface: &mut softbuffer::Surface<Rc<Window>, Rc<Window>>,
    renderer: &Renderer,
    frame: &kiwi8_core::Frame
) -> Result<()> {
    let size = window.inner_size();
    let (Some(width), Some(height)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) else {
        // minimized
        return Ok(());
    };
    surface.resize(width, height)
        .map_err(|e| anyhow!("unable to resize surface: {e}"))?;
    let mut buffer = surface.buffer_mut()
        .map_err(|e| anyhow!("unable to get frame buffer: {e}"))?;
    renderer.draw(frame, &mut buffer, width.get() as usize, height.get() as usize);
    buffer.present()
        .map_err(|e| anyhow!("unable to present frame: {e}"))?;
    Ok(())
}

fn toggle_fullscreen(window: &Window) {
    if window.fullscreen().is_some() {
        window.set_fullscreen(None);
        window.set_cursor_visible(true);
    } else {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        window.set_cursor_visible(false);
    }
}
