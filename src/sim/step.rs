//! Fixed-substep simulation advance
//!
//! One `step(dt)` call fully advances the world: integrate, collide with the
//! bowl, relax pairwise contacts, then update sleep state once per frame.
//! The last contact sweep of each substep re-projects every body it moves,
//! so nothing leaves the bowl and no wall correction undoes the final
//! separation.

use super::contact::{pair_mut, resolve_pair};
use super::state::Simulation;

impl Simulation {
    /// Advance by one frame of `dt` seconds
    pub fn step(&mut self, dt: f32) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let substeps = self.config.substeps.max(1);
        let sub_dt = dt / substeps as f32;

        let passes = self.config.collision_passes.max(1);

        for _ in 0..substeps {
            self.time += f64::from(sub_dt);
            self.integrate(sub_dt);
            for pass in 1..=passes {
                let last = pass == passes;
                if last {
                    for body in &mut self.bodies {
                        self.bowl.contain(body);
                    }
                }
                self.resolve_contacts(last);
            }
        }

        self.update_sleep();
        self.frame += 1;
    }

    /// Forces, integration and wall collision for every awake body
    fn integrate(&mut self, sub_dt: f32) {
        let config = &self.config;
        let time = self.time;

        for body in &mut self.bodies {
            self.immersion.update(body);
            if body.asleep {
                continue;
            }

            let (gravity, friction, vertical_drag) = if body.underwater {
                (config.gravity_water, config.friction_water, config.vertical_drag_water)
            } else {
                (config.gravity_air, config.friction_air, config.vertical_drag_air)
            };

            if body.underwater {
                body.vel.x += self.immersion.wobble_accel(body, time) * sub_dt;
                body.vel.x *= 1.0 - config.wobble_damp * sub_dt;
            }

            body.vel.y += gravity * sub_dt;
            body.pos += body.vel * sub_dt;
            body.vel.x *= friction;
            body.vel.y *= vertical_drag;

            self.bowl.collide(body);
        }
    }

    /// One pass over every unordered pair, in id order
    ///
    /// With `contain`, both bodies of a touching pair are pulled back inside
    /// the bowl right after their separation.
    fn resolve_contacts(&mut self, contain: bool) {
        let restitution = self.config.body_restitution;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = pair_mut(&mut self.bodies, i, j);
                let outcome = resolve_pair(a, b, restitution, &mut self.rng);
                if contain && outcome.touching {
                    self.bowl.contain(a);
                    self.bowl.contain(b);
                }
            }
        }
    }

    /// Count slow frames below the rim; enough in a row puts a body to sleep
    fn update_sleep(&mut self) {
        let rim_y = self.bowl.rim_y();
        let sleep_speed = self.config.sleep_speed;
        let sleep_frames = self.config.sleep_frames;

        for body in self.bodies.iter_mut().filter(|b| !b.asleep) {
            if body.speed() < sleep_speed && body.pos.y > rim_y + body.radius() {
                body.sleep_counter += 1;
                if body.sleep_counter >= sleep_frames {
                    body.sleep();
                    log::debug!("Body {} asleep at ({:.1}, {:.1})", body.id, body.pos.x, body.pos.y);
                }
            } else {
                body.sleep_counter = 0;
            }
        }
    }
}
